use crate::feed::{detect::Detection, histogram::Histogram};
use framepool::{BoxError, Computation, JobContext};
use parking_lot::Mutex;
use serde::Serialize;
use std::{future::Future, sync::Arc};

/// Frames brighter than this on average are treated as washed out.
pub const DEFAULT_MAX_MEAN_LEVEL: f32 = 200.0;

/// Device pose relative to the marker field.
///
/// `x` and `y` are the offset of the marker centroid from the frame center,
/// normalized to `-1.0..=1.0`. `heading` is in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseStatus {
    /// Nothing has been seen yet.
    #[default]
    Unavailable,
    /// Estimated from the current detection.
    Updated,
    /// The current detection was unusable; the pose is the last good one.
    LastKnown,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PoseEstimate {
    pub frame_index: Option<u64>,
    pub status: PoseStatus,
    pub pose: Option<Pose>,
    pub markers_used: usize,
}

/// The last good pose seen by any worker of the stage, keyed by the frame it
/// was estimated from.
///
/// Workers finish out of order, so a pose only replaces the recorded one if
/// its frame is newer.
#[derive(Clone, Debug, Default)]
pub struct PoseTrack {
    last: Arc<Mutex<Option<(u64, Pose)>>>,
}

impl PoseTrack {
    /// Records `pose` unless a pose from a newer frame is already known.
    pub fn record(&self, frame_index: u64, pose: Pose) {
        let mut last = self.last.lock();
        if last.is_none_or(|(known, _)| frame_index > known) {
            *last = Some((frame_index, pose));
        }
    }

    pub fn last(&self) -> Option<(u64, Pose)> {
        *self.last.lock()
    }
}

/// Turns a detection and the matching frame statistics into a pose.
#[derive(Clone, Debug)]
pub struct PoseEstimator {
    max_mean_level: f32,
    track: PoseTrack,
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self {
            max_mean_level: DEFAULT_MAX_MEAN_LEVEL,
            track: PoseTrack::default(),
        }
    }
}

impl PoseEstimator {
    pub fn estimate(&self, detection: &Detection, histogram: &Histogram) -> Option<Pose> {
        if detection.markers.is_empty() || histogram.mean > self.max_mean_level {
            return None;
        }

        let count = detection.markers.len() as f32;
        let (sum_x, sum_y) = detection
            .markers
            .iter()
            .fold((0.0, 0.0), |(sx, sy), m| (sx + m.x, sy + m.y));
        let half_w = detection.width as f32 / 2.0;
        let half_h = detection.height as f32 / 2.0;

        // Heading follows the axis from the lowest to the highest marker id.
        let first = detection.markers.iter().min_by_key(|m| m.id)?;
        let last = detection.markers.iter().max_by_key(|m| m.id)?;
        let heading = if first.id == last.id {
            0.0
        } else {
            (last.y - first.y).atan2(last.x - first.x)
        };

        Some(Pose {
            x: (sum_x / count - half_w) / half_w,
            y: (sum_y / count - half_h) / half_h,
            heading,
        })
    }

    pub fn track(&self) -> &PoseTrack {
        &self.track
    }

    fn update(&self, (detection, histogram): &(Detection, Histogram), output: &mut PoseEstimate) {
        output.frame_index = detection.frame_index;
        match self.estimate(detection, histogram) {
            Some(pose) => {
                if let Some(frame_index) = detection.frame_index {
                    self.track.record(frame_index, pose);
                }
                output.status = PoseStatus::Updated;
                output.pose = Some(pose);
                output.markers_used = detection.markers.len();
            }
            None => {
                let last = self.track.last().map(|(_, pose)| pose);
                output.status = match last {
                    Some(_) => PoseStatus::LastKnown,
                    None => PoseStatus::Unavailable,
                };
                output.pose = last;
                output.markers_used = 0;
            }
        }
    }
}

impl Computation for PoseEstimator {
    type Input = (Detection, Histogram);
    type Output = PoseEstimate;
    type Aux = ();

    fn compute<'a>(
        &'a self,
        input: &'a (Detection, Histogram),
        output: &'a mut PoseEstimate,
        _aux: &'a mut (),
        _job: JobContext,
    ) -> impl Future<Output = Result<(), BoxError>> + Send + 'a {
        self.update(input, output);
        core::future::ready(Ok(()))
    }
}
