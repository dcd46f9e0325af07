//! A real-time bounded worker pool.
//!
//! `framepool` feeds a continuous stream of inputs (typically camera frames)
//! into a small, reusable set of workers. Each worker wraps one opaque and
//! possibly slow computation and owns its own recycled output and scratch
//! buffers. The caller can always [`retrieve`] the most recent result in
//! *submission* order without blocking:
//!
//! - every input gets a monotonically increasing [`Token`];
//! - a finished job only replaces the retained result if its token is newer;
//! - when every worker is busy and the pool is full, the input is handed to
//!   an [`OverloadPolicy`] (by default it is dropped) instead of queued;
//! - jobs that outlive the configured timeout are cancelled and their output
//!   is never observed.
//!
//! Pools implement [`Pipeline`] and compose with [`PipelineExt::then`] and
//! [`PipelineExt::diamond`].
//!
//! ```
//! use std::time::Duration;
//! use framepool::{SupplyStatus, TokioRuntime, WorkerPool, compute_fn};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let pool = WorkerPool::builder(
//!     TokioRuntime::from_handle(rt.handle().clone()),
//!     compute_fn(|frame: &Vec<u8>, sum: &mut u64, _: &mut ()| {
//!         *sum = frame.iter().map(|&b| u64::from(b)).sum();
//!         Ok::<_, std::convert::Infallible>(())
//!     }),
//! )
//! .max_workers(2)
//! .job_timeout(Duration::from_millis(500))
//! .default_buffers()
//! .build()
//! .unwrap();
//!
//! assert!(matches!(pool.supply(vec![1, 2, 3]), SupplyStatus::Dispatched { .. }));
//! rt.block_on(pool.drain(Duration::from_secs(1))).unwrap();
//! assert_eq!(pool.retrieve(), 6);
//! ```
//!
//! [`retrieve`]: WorkerPool::retrieve

mod computation;
mod error;
mod future;
mod mutex;
mod overload;
mod pipeline;
mod pool;
mod runtime;
mod status;
mod token;
mod worker;

pub use crate::computation::*;
pub use crate::error::*;
pub use crate::future::*;
pub use crate::overload::*;
pub use crate::pipeline::*;
pub use crate::pool::*;
pub use crate::runtime::*;
pub use crate::status::*;
pub use crate::token::*;
pub use crate::worker::Worker;
