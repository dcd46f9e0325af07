use crate::feed::frame::Frame;
use framepool::{BoxError, Computation, JobContext};
use serde::Serialize;
use std::{future::Future, sync::Arc};

pub const BINS: usize = 16;

/// Brightness histogram of one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Histogram {
    pub frame_index: Option<u64>,
    pub bins: [u32; BINS],
    /// Mean pixel level in `0..=255`.
    pub mean: f32,
}

/// Computes a [`Histogram`] per frame. Runs alongside the detector.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats;

impl FrameStats {
    fn fill(frame: &Frame, histogram: &mut Histogram) {
        histogram.frame_index = Some(frame.index);
        histogram.bins = [0; BINS];

        let mut total = 0u64;
        for &level in &frame.pixels {
            histogram.bins[usize::from(level) * BINS / 256] += 1;
            total += u64::from(level);
        }
        histogram.mean = if frame.pixels.is_empty() {
            0.0
        } else {
            total as f32 / frame.pixels.len() as f32
        };
    }
}

impl Computation for FrameStats {
    type Input = Arc<Frame>;
    type Output = Histogram;
    type Aux = ();

    fn compute<'a>(
        &'a self,
        frame: &'a Arc<Frame>,
        histogram: &'a mut Histogram,
        _aux: &'a mut (),
        _job: JobContext,
    ) -> impl Future<Output = Result<(), BoxError>> + Send + 'a {
        Self::fill(frame, histogram);
        core::future::ready(Ok(()))
    }
}
