use core::time::Duration;

/// A result type defaulting to the crate's [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The error type a [`Computation`] may fail with.
///
/// Computation errors never reach the caller of
/// [`WorkerPool::supply`]; they are logged and counted by the pool.
///
/// [`Computation`]: crate::Computation
/// [`WorkerPool::supply`]: crate::WorkerPool::supply
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// All errors `framepool` can produce.
///
/// The pool itself is designed to degrade rather than fail: overload and job
/// timeouts are reported through [`SupplyStatus`] and [`PoolStats`], not
/// through this type. What remains are construction and lifecycle errors.
///
/// [`SupplyStatus`]: crate::SupplyStatus
/// [`PoolStats`]: crate::PoolStats
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool configuration was rejected at build time.
    #[error("Invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A buffer factory was not provided to the builder.
    #[error("Missing {buffer} buffer factory")]
    MissingFactory { buffer: &'static str },

    /// No ambient Tokio runtime was found when one was requested.
    #[cfg(feature = "async-tokio")]
    #[error("No Tokio runtime available: {context}")]
    NoRuntime { context: String },

    /// In-flight jobs did not finish within the drain timeout.
    #[error("Pool did not drain within {timeout:?} ({in_flight} jobs still in flight)")]
    DrainTimedOut { timeout: Duration, in_flight: usize },
}
