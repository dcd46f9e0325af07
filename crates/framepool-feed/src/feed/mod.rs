//! Stages, configuration and reporting of the synthetic feed.
//!
//! ## Structure
//!
//! - [`frame`] - synthetic frames and their ground truth.
//! - [`detect`] - marker detection stage.
//! - [`histogram`] - brightness statistics stage, fanned out with detection.
//! - [`pose`] - pose estimation stage, chained after both.
//! - [`config`], [`telemetry`], [`summary`] - the ambient parts of the binary.

pub mod config;
pub mod detect;
pub mod frame;
pub mod histogram;
pub mod pose;
pub mod summary;
pub mod telemetry;
