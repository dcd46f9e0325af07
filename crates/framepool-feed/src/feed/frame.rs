//! Synthetic grayscale frames with square fiducial markers.
//!
//! Background pixels are noise below [`MARKER_LEVEL`]. A marker is a solid
//! `MARKER_SIZE` x `MARKER_SIZE` square whose brightness encodes its id.
//! Markers are placed in distinct cells of a grid twice the marker size, so
//! they never touch.

use rand::{Rng, SeedableRng, rngs::StdRng, seq::index};
use std::time::Instant;

pub const MARKER_SIZE: usize = 8;
pub const MARKER_IDS: u8 = 16;
pub const MARKER_LEVEL: u8 = 128;
const LEVEL_STEP: u8 = 8;
const NOISE_LEVEL: u8 = 96;
const CELL: usize = MARKER_SIZE * 2;

/// Brightness a marker with `id` is rendered with.
pub const fn marker_level(id: u8) -> u8 {
    MARKER_LEVEL + id * LEVEL_STEP
}

/// Decodes the marker id from a pixel, `None` for background.
pub const fn marker_id(level: u8) -> Option<u8> {
    if level < MARKER_LEVEL {
        None
    } else {
        Some((level - MARKER_LEVEL) / LEVEL_STEP)
    }
}

/// How many markers fit in a frame of the given size.
pub const fn max_markers(width: usize, height: usize) -> usize {
    (width / CELL) * (height / CELL)
}

/// A marker as rendered, identified by its top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlacedMarker {
    pub id: u8,
    pub x: usize,
    pub y: usize,
}

#[derive(Debug)]
pub struct Frame {
    pub index: u64,
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
    /// Ground truth of what was rendered.
    pub markers: Vec<PlacedMarker>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }
}

/// Renders an endless, reproducible sequence of frames.
pub struct FrameSource {
    rng: StdRng,
    width: usize,
    height: usize,
    markers: usize,
    dropout: f64,
    next_index: u64,
}

impl FrameSource {
    /// `markers` must not exceed [`max_markers`] for the frame size.
    pub fn new(width: usize, height: usize, markers: usize, dropout: f64, seed: u64) -> Self {
        debug_assert!(markers <= max_markers(width, height));
        Self {
            rng: StdRng::seed_from_u64(seed),
            width,
            height,
            markers,
            dropout,
            next_index: 0,
        }
    }

    pub fn next_frame(&mut self) -> Frame {
        let index = self.next_index;
        self.next_index += 1;

        let mut pixels = vec![0u8; self.width * self.height];
        pixels
            .iter_mut()
            .for_each(|pixel| *pixel = self.rng.random_range(0..NOISE_LEVEL));

        let visible = if self.rng.random_bool(self.dropout) {
            0
        } else {
            self.markers
        };

        let columns = self.width / CELL;
        let cells = max_markers(self.width, self.height);
        let mut markers = Vec::with_capacity(visible);
        for cell in index::sample(&mut self.rng, cells, visible) {
            let marker = PlacedMarker {
                id: self.rng.random_range(0..MARKER_IDS),
                x: (cell % columns) * CELL + self.rng.random_range(0..=CELL - MARKER_SIZE),
                y: (cell / columns) * CELL + self.rng.random_range(0..=CELL - MARKER_SIZE),
            };
            for row in marker.y..marker.y + MARKER_SIZE {
                let start = row * self.width + marker.x;
                pixels[start..start + MARKER_SIZE].fill(marker_level(marker.id));
            }
            markers.push(marker);
        }

        Frame {
            index,
            width: self.width,
            height: self.height,
            pixels,
            markers,
            captured_at: Instant::now(),
        }
    }
}
