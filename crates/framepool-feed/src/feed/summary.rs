use crate::feed::pose::{PoseEstimate, PoseStatus};
use framepool::PoolStats;
use serde::Serialize;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoseCounts {
    pub updated: u64,
    pub last_known: u64,
    pub unavailable: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub detector: PoolStats,
    pub frame_stats: PoolStats,
    pub pose: PoolStats,
}

/// What the feed observed, reported once it shuts down.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FeedSummary {
    pub frames: u64,
    pub elapsed_ms: u128,
    pub effective_fps: f64,
    pub pose: PoseCounts,
    /// Frames between the newest supplied frame and the frame the retrieved
    /// pose was computed from, averaged over frames that had a pose.
    pub mean_lag_frames: f64,
    pub max_lag_frames: u64,
    pub stages: StageStats,
    #[serde(skip)]
    lag_total: u64,
    #[serde(skip)]
    lag_samples: u64,
}

impl FeedSummary {
    /// Records the estimate retrieved right after supplying `frame_index`.
    pub fn observe(&mut self, frame_index: u64, estimate: &PoseEstimate) {
        self.frames += 1;
        match estimate.status {
            PoseStatus::Updated => self.pose.updated += 1,
            PoseStatus::LastKnown => self.pose.last_known += 1,
            PoseStatus::Unavailable => self.pose.unavailable += 1,
        }
        if let Some(source) = estimate.frame_index {
            let lag = frame_index.saturating_sub(source);
            self.lag_total += lag;
            self.lag_samples += 1;
            self.max_lag_frames = self.max_lag_frames.max(lag);
            self.mean_lag_frames = self.lag_total as f64 / self.lag_samples as f64;
        }
    }

    pub fn finish(&mut self, elapsed: Duration, stages: StageStats) {
        self.elapsed_ms = elapsed.as_millis();
        self.effective_fps = if elapsed.is_zero() {
            0.0
        } else {
            self.frames as f64 / elapsed.as_secs_f64()
        };
        self.stages = stages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(status: PoseStatus, frame_index: Option<u64>) -> PoseEstimate {
        PoseEstimate {
            status,
            frame_index,
            ..PoseEstimate::default()
        }
    }

    #[test]
    fn tracks_status_and_lag() {
        let mut summary = FeedSummary::default();
        summary.observe(0, &estimate(PoseStatus::Unavailable, None));
        summary.observe(5, &estimate(PoseStatus::Updated, Some(2)));
        summary.observe(6, &estimate(PoseStatus::LastKnown, Some(5)));

        assert_eq!(summary.frames, 3);
        assert_eq!(
            summary.pose,
            PoseCounts {
                updated: 1,
                last_known: 1,
                unavailable: 1,
            }
        );
        assert_eq!(summary.max_lag_frames, 3);
        assert_eq!(summary.mean_lag_frames, 2.0);
    }

    #[test]
    fn serializes_without_internal_counters() {
        let mut summary = FeedSummary::default();
        summary.observe(1, &estimate(PoseStatus::Updated, Some(1)));
        summary.finish(Duration::from_secs(2), StageStats::default());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["frames"], 1);
        assert_eq!(json["effective_fps"], 0.5);
        assert_eq!(json["stages"]["pose"]["completed"], 0);
        assert!(json.get("lag_total").is_none());
    }
}
