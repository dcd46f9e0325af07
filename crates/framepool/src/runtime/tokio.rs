use crate::{Error, Result, Runtime};
use core::time::Duration;
use std::future::Future;
use tokio::runtime::Handle;

/// A [`Runtime`] backed by a Tokio runtime [`Handle`].
///
/// Jobs are spawned on the handle and timeouts use Tokio's timer, so the
/// runtime must have the time driver enabled.
///
/// # Example
///
/// ```
/// use framepool::TokioRuntime;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let runtime = TokioRuntime::from_handle(rt.handle().clone());
/// # let _ = runtime;
/// ```
#[derive(Clone, Debug)]
pub struct TokioRuntime {
    handle: Handle,
}

impl TokioRuntime {
    /// Wraps an explicit runtime handle.
    pub const fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Captures the handle of the runtime the caller is currently running
    /// on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] when called outside of a Tokio runtime.
    pub fn try_current() -> Result<Self> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|e| Error::NoRuntime {
                context: e.to_string(),
            })
    }

    /// Returns the wrapped handle.
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Runtime for TokioRuntime {
    type Sleep = tokio::time::Sleep;

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Dropping the JoinHandle detaches the task.
        drop(self.handle.spawn(future));
    }

    fn sleep(&self, duration: Duration) -> Self::Sleep {
        // Bind the timer to this runtime even when the caller polls it from
        // somewhere else.
        let _guard = self.handle.enter();
        tokio::time::sleep(duration)
    }
}
