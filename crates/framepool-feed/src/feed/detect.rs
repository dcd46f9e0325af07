use crate::feed::frame::{Frame, MARKER_SIZE, marker_id};
use framepool::{BoxError, Computation, JobContext};
use rand::Rng;
use serde::Serialize;
use std::{future::Future, sync::Arc, time::Duration};

/// Upper bound on markers reported per frame. Extra markers are ignored.
pub const MAX_MARKERS: usize = 64;

const OUTLINE_LEVEL: u8 = 0;

/// A detected marker and its centroid in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Marker {
    pub id: u8,
    pub x: f32,
    pub y: f32,
}

/// What the detector found in one frame.
///
/// `annotated` is a copy of the frame with every detected marker outlined.
/// It is the largest buffer in the pipeline, so [`Clone::clone_from`]
/// reuses the destination's storage.
#[derive(Debug, Default)]
pub struct Detection {
    pub frame_index: Option<u64>,
    pub width: usize,
    pub height: usize,
    pub markers: Vec<Marker>,
    pub annotated: Vec<u8>,
}

impl Clone for Detection {
    fn clone(&self) -> Self {
        Self {
            frame_index: self.frame_index,
            width: self.width,
            height: self.height,
            markers: self.markers.clone(),
            annotated: self.annotated.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.frame_index = source.frame_index;
        self.width = source.width;
        self.height = source.height;
        self.markers.clone_from(&source.markers);
        self.annotated.clone_from(&source.annotated);
    }
}

/// Per-worker scratch: the top-left corners and ids of the markers found so
/// far in the current frame.
#[derive(Debug)]
pub struct DetectorScratch {
    ids: [u8; MAX_MARKERS],
    origins: [(usize, usize); MAX_MARKERS],
    len: usize,
}

impl Default for DetectorScratch {
    fn default() -> Self {
        Self {
            ids: [0; MAX_MARKERS],
            origins: [(0, 0); MAX_MARKERS],
            len: 0,
        }
    }
}

impl DetectorScratch {
    fn clear(&mut self) {
        self.len = 0;
    }

    fn covers(&self, x: usize, y: usize) -> bool {
        self.origins[..self.len]
            .iter()
            .any(|&(ox, oy)| (ox..ox + MARKER_SIZE).contains(&x) && (oy..oy + MARKER_SIZE).contains(&y))
    }

    /// Returns `false` once the scratch is full.
    fn push(&mut self, id: u8, x: usize, y: usize) -> bool {
        if self.len == MAX_MARKERS {
            return false;
        }
        self.ids[self.len] = id;
        self.origins[self.len] = (x, y);
        self.len += 1;
        true
    }

    fn found(&self) -> impl Iterator<Item = (u8, (usize, usize))> + '_ {
        self.ids[..self.len]
            .iter()
            .copied()
            .zip(self.origins[..self.len].iter().copied())
    }
}

/// Scans a frame for markers.
///
/// Stands in for an opaque vision backend: the scan itself is cheap, so
/// each job also sleeps for `latency` plus up to `jitter` to mimic a slow
/// native call.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    latency: Duration,
    jitter: Duration,
}

impl MarkerDetector {
    pub const fn new(latency: Duration, jitter: Duration) -> Self {
        Self { latency, jitter }
    }

    fn delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.latency;
        }
        self.latency + rand::rng().random_range(Duration::ZERO..=self.jitter)
    }
}

/// Raster scan: the first marker pixel seen for a square is its top-left
/// corner, since markers never touch.
pub fn scan(frame: &Frame, scratch: &mut DetectorScratch) {
    scratch.clear();
    for y in 0..frame.height {
        for x in 0..frame.width {
            let Some(id) = marker_id(frame.pixel(x, y)) else {
                continue;
            };
            if scratch.covers(x, y) {
                continue;
            }
            if !scratch.push(id, x, y) {
                return;
            }
        }
    }
}

fn annotate(frame: &Frame, scratch: &DetectorScratch, output: &mut Detection) {
    output.frame_index = Some(frame.index);
    output.width = frame.width;
    output.height = frame.height;

    output.markers.clear();
    output.markers.extend(scratch.found().map(|(id, (x, y))| Marker {
        id,
        x: x as f32 + (MARKER_SIZE as f32 - 1.0) / 2.0,
        y: y as f32 + (MARKER_SIZE as f32 - 1.0) / 2.0,
    }));

    output.annotated.clear();
    output.annotated.extend_from_slice(&frame.pixels);
    for (_, (x, y)) in scratch.found() {
        let last = MARKER_SIZE - 1;
        for i in 0..MARKER_SIZE {
            for (px, py) in [(x + i, y), (x + i, y + last), (x, y + i), (x + last, y + i)] {
                output.annotated[py * frame.width + px] = OUTLINE_LEVEL;
            }
        }
    }
}

impl Computation for MarkerDetector {
    type Input = Arc<Frame>;
    type Output = Detection;
    type Aux = DetectorScratch;

    fn compute<'a>(
        &'a self,
        frame: &'a Arc<Frame>,
        output: &'a mut Detection,
        scratch: &'a mut DetectorScratch,
        _job: JobContext,
    ) -> impl Future<Output = Result<(), BoxError>> + Send + 'a {
        let delay = self.delay();
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            scan(frame, scratch);
            annotate(frame, scratch, output);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::frame::{FrameSource, PlacedMarker};
    use framepool::Token;
    use std::collections::HashSet;

    fn job() -> JobContext {
        JobContext::new(Token::ZERO, 0, Duration::from_secs(1))
    }

    #[test]
    fn scan_finds_every_rendered_marker() {
        let mut source = FrameSource::new(160, 120, 12, 0.0, 3);
        let mut scratch = DetectorScratch::default();

        for _ in 0..10 {
            let frame = source.next_frame();
            scan(&frame, &mut scratch);

            let found: HashSet<_> = scratch
                .found()
                .map(|(id, (x, y))| PlacedMarker { id, x, y })
                .collect();
            let expected: HashSet<_> = frame.markers.iter().copied().collect();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn scratch_stops_at_capacity() {
        let mut scratch = DetectorScratch::default();
        for i in 0..MAX_MARKERS {
            assert!(scratch.push(0, i * MARKER_SIZE, 0));
        }
        assert!(!scratch.push(0, 0, 100));
        assert_eq!(scratch.found().count(), MAX_MARKERS);
    }

    #[tokio::test]
    async fn detection_reuses_output_buffers() {
        let detector = MarkerDetector::new(Duration::ZERO, Duration::ZERO);
        let mut source = FrameSource::new(64, 64, 3, 0.0, 11);
        let mut output = Detection::default();
        let mut scratch = DetectorScratch::default();

        let frame = Arc::new(source.next_frame());
        detector.compute(&frame, &mut output, &mut scratch, job()).await.unwrap();
        let capacity = output.annotated.capacity();

        let frame = Arc::new(source.next_frame());
        detector.compute(&frame, &mut output, &mut scratch, job()).await.unwrap();

        assert_eq!(output.frame_index, Some(1));
        assert_eq!(output.markers.len(), 3);
        assert_eq!(output.annotated.len(), 64 * 64);
        assert_eq!(output.annotated.capacity(), capacity);

        let marker = frame.markers[0];
        assert_eq!(output.annotated[marker.y * 64 + marker.x], OUTLINE_LEVEL);
        let inner = (marker.y + 1) * 64 + marker.x + 1;
        assert_eq!(output.annotated[inner], frame.pixels[inner]);
    }

    #[test]
    fn clone_from_reuses_storage() {
        let source = Detection {
            frame_index: Some(4),
            width: 2,
            height: 1,
            markers: vec![Marker::default()],
            annotated: vec![1, 2],
        };
        let mut dst = Detection {
            annotated: Vec::with_capacity(16),
            ..Detection::default()
        };
        let ptr = dst.annotated.as_ptr();

        dst.clone_from(&source);

        assert_eq!(dst.annotated, [1, 2]);
        assert_eq!(dst.annotated.as_ptr(), ptr);
        assert_eq!(dst.frame_index, Some(4));
    }
}
