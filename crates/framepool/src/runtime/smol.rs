use crate::Runtime;
use core::time::Duration;
use pin_project_lite::pin_project;
use smol::{Executor, Timer};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// A [`Runtime`] backed by smol.
///
/// Either wraps an explicit [`Executor`] (which the embedder is responsible
/// for running, e.g. on a few threads via `Executor::run`), or smol's global
/// executor.
#[derive(Clone, Debug, Default)]
pub struct SmolRuntime {
    executor: Option<Arc<Executor<'static>>>,
}

impl SmolRuntime {
    /// Spawns onto smol's global executor.
    pub const fn global() -> Self {
        Self { executor: None }
    }

    /// Spawns onto an explicit executor.
    pub const fn from_executor(executor: Arc<Executor<'static>>) -> Self {
        Self {
            executor: Some(executor),
        }
    }
}

impl Runtime for SmolRuntime {
    type Sleep = SmolSleepFuture;

    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match &self.executor {
            Some(executor) => executor.spawn(future).detach(),
            None => smol::spawn(future).detach(),
        }
    }

    fn sleep(&self, duration: Duration) -> Self::Sleep {
        SmolSleepFuture {
            timer: Timer::after(duration),
        }
    }
}

pin_project! {
    /// Future returned by [`SmolRuntime::sleep`].
    ///
    /// This type wraps a [`smol::Timer`] and implements [`Future`] with
    /// `Output = ()`, discarding the timer's `Instant` result.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct SmolSleepFuture {
        #[pin]
        timer: Timer,
    }
}

impl Future for SmolSleepFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.project().timer.poll(cx) {
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}
