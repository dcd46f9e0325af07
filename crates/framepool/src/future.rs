use pin_project_lite::pin_project;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

/// The result of racing a future against a [`Deadline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Raced<T> {
    /// The future resolved first.
    Completed(T),
    /// The timer fired first; the future was not polled to completion.
    Expired,
}

impl<T> Raced<T> {
    /// Returns the completed value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Expired => None,
        }
    }
}

pin_project! {
    /// A future that races `future` against a `timer`.
    ///
    /// Exactly one side wins. The wrapped future is polled before the timer,
    /// so a future that is ready on the same poll as the timer counts as
    /// completed. When the timer wins, dropping the `Deadline` drops the
    /// wrapped future, which is how jobs are cancelled.
    ///
    /// # Example
    ///
    /// ```
    /// use framepool::{Deadline, Raced};
    ///
    /// let raced = futures::executor::block_on(Deadline::new(
    ///     async { 7 },
    ///     futures::future::pending::<()>(),
    /// ));
    /// assert_eq!(raced, Raced::Completed(7));
    /// ```
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Deadline<F, S> {
        #[pin]
        future: F,
        #[pin]
        timer: S,
    }
}

impl<F, S> Deadline<F, S>
where
    F: Future,
    S: Future<Output = ()>,
{
    /// Races `future` against `timer`.
    pub fn new(future: F, timer: S) -> Self {
        Self { future, timer }
    }
}

impl<F, S> Future for Deadline<F, S>
where
    F: Future,
    S: Future<Output = ()>,
{
    type Output = Raced<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Poll::Ready(value) = this.future.poll(cx) {
            return Poll::Ready(Raced::Completed(value));
        }

        match this.timer.poll(cx) {
            Poll::Ready(()) => Poll::Ready(Raced::Expired),
            Poll::Pending => Poll::Pending,
        }
    }
}
