use core::time::Duration;
use std::future::Future;

/// The executor handle a [`WorkerPool`] launches its jobs on.
///
/// The pool never reaches for a process-wide dispatcher: the runtime is
/// passed in when the pool is built and every job and timer goes through it.
/// Implementations exist for Tokio ([`TokioRuntime`]) and smol
/// ([`SmolRuntime`]) behind the `async-tokio` and `async-smol` features.
///
/// [`WorkerPool`]: crate::WorkerPool
/// [`TokioRuntime`]: crate::TokioRuntime
/// [`SmolRuntime`]: crate::SmolRuntime
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Timer future returned by [`Self::sleep`]. We require `Send` so that
    /// jobs racing against it can move across threads.
    type Sleep: Future<Output = ()> + Send;

    /// Spawns a detached task. The task runs to completion even though no
    /// handle to it is kept.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns a future that resolves once `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> Self::Sleep;
}
