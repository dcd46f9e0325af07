use crate::{BoxError, Token};
use core::{marker::PhantomData, time::Duration};
use std::{future::Future, time::Instant};

/// The opaque, possibly slow work a [`WorkerPool`] runs for every input.
///
/// A computation reads the input and writes its result into `output`, a
/// buffer that belongs to the worker and is recycled across jobs. `aux` is
/// a per-worker scratch structure that is also recycled. Implementations
/// should overwrite whatever state they read from the buffers rather than
/// assuming they start out empty.
///
/// The returned future may be dropped at any await point once the job
/// deadline passes. Blocking computations cannot be interrupted; their
/// output is discarded if they return after the deadline.
///
/// Synchronous closures can be adapted with [`compute_fn`], which runs them
/// inline on the executor.
///
/// [`WorkerPool`]: crate::WorkerPool
pub trait Computation: Send + Sync + 'static {
    /// The value supplied to the pool. Jobs borrow it across await points,
    /// hence `Sync`.
    type Input: Send + Sync + 'static;
    /// The recycled result buffer.
    type Output: Send + 'static;
    /// The recycled per-worker scratch buffer.
    type Aux: Send + 'static;

    /// Runs the computation for one job.
    fn compute<'a>(
        &'a self,
        input: &'a Self::Input,
        output: &'a mut Self::Output,
        aux: &'a mut Self::Aux,
        job: JobContext,
    ) -> impl Future<Output = Result<(), BoxError>> + Send + 'a;
}

/// Per-job parameters handed to [`Computation::compute`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobContext {
    token: Token,
    worker: usize,
    started_at: Instant,
    deadline: Instant,
}

impl JobContext {
    /// Starts the clock on a job that must finish within `timeout`.
    ///
    /// The pool builds these itself; constructing one by hand is mostly
    /// useful to exercise a [`Computation`] outside of a pool.
    pub fn new(token: Token, worker: usize, timeout: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            token,
            worker,
            started_at,
            deadline: started_at + timeout,
        }
    }

    /// Token of the input this job runs against.
    pub const fn token(&self) -> Token {
        self.token
    }

    /// Index of the worker running the job.
    pub const fn worker(&self) -> usize {
        self.worker
    }

    /// When the job was launched.
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// When the job will be cancelled.
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Whether a failed job's output may replace the retained result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailurePolicy {
    /// Keep the previous retained result; the failed output stays with the
    /// worker and is overwritten by its next job.
    #[default]
    Discard,
    /// Commit the (possibly partial) output under the usual token rule.
    Retain,
}

/// A [`Computation`] built from a synchronous closure. See [`compute_fn`].
pub struct FnComputation<F, I, O, A> {
    f: F,
    _marker: PhantomData<fn(&I, &mut O, &mut A)>,
}

/// Adapts a synchronous closure into a [`Computation`].
///
/// The closure runs inline on one of the runtime's worker threads and is
/// never pre-empted. Until it returns, that thread runs nothing else, not
/// even the timers of other jobs, and the worker stays busy past its
/// deadline. A closure that overruns the job timeout is reported as timed
/// out and its output is discarded, but only once it returns.
///
/// Keep closures short. CPU-bound or blocking backends should implement
/// [`Computation`] directly and move the work off the executor, e.g. with
/// `tokio::task::spawn_blocking` or `smol::unblock`, awaiting the result so
/// the job timeout can cancel the wait.
///
/// # Example
///
/// ```
/// use framepool::compute_fn;
///
/// let doubled = compute_fn(|x: &u32, out: &mut u32, _: &mut ()| {
///     *out = x * 2;
///     Ok::<_, std::convert::Infallible>(())
/// });
/// # let _ = doubled;
/// ```
pub fn compute_fn<F, I, O, A, E>(f: F) -> FnComputation<F, I, O, A>
where
    F: Fn(&I, &mut O, &mut A) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    FnComputation {
        f,
        _marker: PhantomData,
    }
}

impl<F, I, O, A, E> Computation for FnComputation<F, I, O, A>
where
    F: Fn(&I, &mut O, &mut A) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError>,
    I: Send + Sync + 'static,
    O: Send + 'static,
    A: Send + 'static,
{
    type Input = I;
    type Output = O;
    type Aux = A;

    fn compute<'a>(
        &'a self,
        input: &'a I,
        output: &'a mut O,
        aux: &'a mut A,
        _job: JobContext,
    ) -> impl Future<Output = Result<(), BoxError>> + Send + 'a {
        core::future::ready((self.f)(input, output, aux).map_err(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn closure_writes_into_output() {
        let computation = compute_fn(|x: &u32, out: &mut u32, calls: &mut u32| {
            *calls += 1;
            *out = x + 1;
            Ok::<_, BoxError>(())
        });

        let (mut out, mut calls) = (0, 0);
        let job = JobContext::new(Token::ZERO, 0, Duration::from_secs(1));
        block_on(computation.compute(&41, &mut out, &mut calls, job)).unwrap();
        block_on(computation.compute(&41, &mut out, &mut calls, job)).unwrap();

        assert_eq!(out, 42);
        assert_eq!(calls, 2);
    }

    #[test]
    fn closure_errors_are_boxed() {
        let computation =
            compute_fn(|_: &(), _: &mut (), _: &mut ()| Err::<(), _>("backend unavailable"));
        let job = JobContext::new(Token::ZERO, 0, Duration::from_secs(1));
        let err = block_on(computation.compute(&(), &mut (), &mut (), job)).unwrap_err();
        assert_eq!(err.to_string(), "backend unavailable");
    }

    #[test]
    fn job_context_tracks_deadline() {
        let job = JobContext::new(Token::from_raw(9), 3, Duration::from_secs(60));
        assert_eq!(job.token(), Token::from_raw(9));
        assert_eq!(job.worker(), 3);
        assert!(!job.is_expired());
        assert!(job.remaining() <= Duration::from_secs(60));
        assert_eq!(job.deadline() - job.started_at(), Duration::from_secs(60));

        let expired = JobContext::new(Token::ZERO, 0, Duration::ZERO);
        assert!(expired.is_expired());
        assert_eq!(expired.remaining(), Duration::ZERO);
    }
}
