use crate::{
    Computation, Deadline, JobContext, JobOutcome, Raced, Runtime, Token, mutex::Mutex,
};
use core::{
    panic::AssertUnwindSafe,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use futures::FutureExt;
use portable_atomic::AtomicU64;
use std::time::Instant;

const NO_TOKEN: u64 = u64::MAX;

/// The buffers a worker owns: the last assigned input, the recycled output
/// and the recycled scratch structure.
///
/// While a job runs the slot is moved out of the worker and into the job's
/// task; it is handed back by [`Worker::release`].
pub(crate) struct Slot<C: Computation> {
    pub(crate) input: Option<C::Input>,
    pub(crate) output: C::Output,
    pub(crate) aux: C::Aux,
}

/// What a job hands back to the scheduler once it is over.
pub(crate) struct Finished<C: Computation> {
    pub(crate) slot: Slot<C>,
    pub(crate) token: Token,
    pub(crate) outcome: JobOutcome,
}

/// One reusable execution slot of a [`WorkerPool`].
///
/// A worker is created the first time the pool needs it and lives as long
/// as the pool. It runs at most one job at a time; a new input can only be
/// assigned after the pool has atomically claimed it while idle.
///
/// [`WorkerPool`]: crate::WorkerPool
pub struct Worker<C: Computation> {
    index: usize,
    busy: AtomicBool,
    token: AtomicU64,
    slot: Mutex<Option<Slot<C>>>,
}

impl<C: Computation> Worker<C> {
    pub(crate) fn new(index: usize, output: C::Output, aux: C::Aux) -> Self {
        Self {
            index,
            busy: AtomicBool::new(false),
            token: AtomicU64::new(NO_TOKEN),
            slot: Mutex::new(Some(Slot {
                input: None,
                output,
                aux,
            })),
        }
    }

    /// Position of this worker in the pool. Lower indices are preferred
    /// when picking an idle worker.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Returns `true` while a job is running on this worker.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Token of the most recent job assigned to this worker.
    pub fn token(&self) -> Option<Token> {
        match self.token.load(Ordering::Acquire) {
            NO_TOKEN => None,
            raw => Some(Token::from_raw(raw)),
        }
    }

    /// Runs `f` against this worker's recycled output buffer.
    ///
    /// Returns `None` while a job is running: the buffer is owned by the job
    /// until it finishes.
    pub fn with_output<R>(&self, f: impl FnOnce(&C::Output) -> R) -> Option<R> {
        let slot = self.slot.lock();
        slot.as_ref().map(|slot| f(&slot.output))
    }

    /// Marks the worker busy and takes its buffers. Fails if the worker is
    /// already running a job.
    pub(crate) fn try_claim(&self) -> Option<Slot<C>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let slot = self.slot.lock().take();
        if slot.is_none() {
            // Only reachable if a previous job never released; keep the
            // worker idle so the caller can move on.
            self.busy.store(false, Ordering::Release);
        }
        slot
    }

    /// Assigns the next job to a claimed slot. `None` keeps the stored input
    /// and only refreshes the token.
    pub(crate) fn assign(&self, slot: &mut Slot<C>, input: Option<C::Input>, token: Token) {
        if let Some(input) = input {
            slot.input = Some(input);
        }
        self.token.store(token.to_raw(), Ordering::Release);
    }

    /// Runs one job against `slot`, raced against `timeout`.
    ///
    /// Resolves once exactly one of completion or expiry has happened. The
    /// computation future is dropped on expiry. A computation that returns
    /// after the deadline without yielding is reported as timed out too.
    pub(crate) async fn compute<R: Runtime>(
        &self,
        computation: &C,
        runtime: &R,
        mut slot: Slot<C>,
        token: Token,
        timeout: Duration,
    ) -> Finished<C> {
        let outcome = {
            let Slot { input, output, aux } = &mut slot;
            match input.as_ref() {
                None => JobOutcome::Skipped,
                Some(input) => {
                    let job = JobContext::new(token, self.index, timeout);
                    let work = AssertUnwindSafe(async {
                        computation.compute(input, output, aux, job).await
                    })
                    .catch_unwind();

                    match Deadline::new(work, runtime.sleep(timeout)).await {
                        Raced::Completed(Ok(Ok(()))) if Instant::now() <= job.deadline() => {
                            JobOutcome::Completed
                        }
                        Raced::Completed(Ok(Ok(()))) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(
                                "Worker {} job {token} returned after its {timeout:?} deadline",
                                self.index
                            );
                            JobOutcome::TimedOut
                        }
                        Raced::Completed(Ok(Err(_e))) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!("Worker {} job {token} failed: {_e}", self.index);
                            JobOutcome::Failed
                        }
                        Raced::Completed(Err(_panic)) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!("Worker {} job {token} panicked", self.index);
                            JobOutcome::Failed
                        }
                        Raced::Expired => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(
                                "Worker {} job {token} cancelled after {timeout:?}",
                                self.index
                            );
                            JobOutcome::TimedOut
                        }
                    }
                }
            }
        };

        Finished {
            slot,
            token,
            outcome,
        }
    }

    /// Hands the buffers back and marks the worker idle.
    pub(crate) fn release(&self, slot: Slot<C>) {
        *self.slot.lock() = Some(slot);
        self.busy.store(false, Ordering::Release);
    }
}

impl<C: Computation> core::fmt::Debug for Worker<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .field("busy", &self.is_busy())
            .field("token", &self.token())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "async-tokio"))]
mod tests {
    use super::*;
    use crate::{BoxError, TokioRuntime, compute_fn};

    type DoubleFn = fn(&u32, &mut u32, &mut u32) -> Result<(), BoxError>;
    type Doubler = crate::FnComputation<DoubleFn, u32, u32, u32>;

    fn double(x: &u32, out: &mut u32, runs: &mut u32) -> Result<(), BoxError> {
        *runs += 1;
        *out = x * 2;
        Ok(())
    }

    fn doubler() -> Doubler {
        compute_fn(double as DoubleFn)
    }

    fn worker_for<C: Computation>(_: &C, output: C::Output, aux: C::Aux) -> Worker<C> {
        Worker::new(0, output, aux)
    }

    #[test]
    fn claim_is_exclusive() {
        let worker = Worker::<Doubler>::new(0, 0, 0);
        let slot = worker.try_claim().unwrap();
        assert!(worker.is_busy());
        assert!(worker.try_claim().is_none());
        assert_eq!(worker.with_output(|out| *out), None);

        worker.release(slot);
        assert!(!worker.is_busy());
        assert_eq!(worker.with_output(|out| *out), Some(0));
        assert!(worker.try_claim().is_some());
    }

    #[test]
    fn assign_none_keeps_previous_input() {
        let worker = Worker::<Doubler>::new(0, 0, 0);
        let mut slot = worker.try_claim().unwrap();
        worker.assign(&mut slot, Some(5), Token::from_raw(1));
        worker.assign(&mut slot, None, Token::from_raw(2));
        assert_eq!(slot.input, Some(5));
        assert_eq!(worker.token(), Some(Token::from_raw(2)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_reuses_buffers() {
        let runtime = TokioRuntime::try_current().unwrap();
        let computation = doubler();
        let worker = Worker::<Doubler>::new(3, 0, 0);

        for (raw, input) in [(0, 10), (1, 11)] {
            let mut slot = worker.try_claim().unwrap();
            worker.assign(&mut slot, Some(input), Token::from_raw(raw));
            let finished = worker
                .compute(&computation, &runtime, slot, Token::from_raw(raw), Duration::from_secs(1))
                .await;
            assert_eq!(finished.outcome, JobOutcome::Completed);
            assert_eq!(finished.token, Token::from_raw(raw));
            worker.release(finished.slot);
        }

        assert_eq!(worker.with_output(|out| *out), Some(22));
        assert_eq!(worker.slot.lock().as_ref().map(|slot| slot.aux), Some(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_without_input_is_skipped() {
        let runtime = TokioRuntime::try_current().unwrap();
        let worker = Worker::<Doubler>::new(0, 0, 0);
        let slot = worker.try_claim().unwrap();
        let finished = worker
            .compute(&doubler(), &runtime, slot, Token::ZERO, Duration::from_secs(1))
            .await;
        assert_eq!(finished.outcome, JobOutcome::Skipped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panics_are_reported_as_failures() {
        let runtime = TokioRuntime::try_current().unwrap();
        let computation = compute_fn(|_: &u32, _: &mut u32, _: &mut ()| -> Result<(), BoxError> {
            panic!("backend crashed")
        });
        let worker = worker_for(&computation, 0, ());
        let mut slot = worker.try_claim().unwrap();
        worker.assign(&mut slot, Some(1), Token::ZERO);

        let finished = worker
            .compute(&computation, &runtime, slot, Token::ZERO, Duration::from_secs(1))
            .await;
        assert_eq!(finished.outcome, JobOutcome::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_overrun_counts_as_timeout() {
        let runtime = TokioRuntime::try_current().unwrap();
        let computation = compute_fn(|x: &u32, out: &mut u32, _: &mut ()| {
            std::thread::sleep(Duration::from_millis(30));
            *out = *x;
            Ok::<_, BoxError>(())
        });
        let worker = worker_for(&computation, 0, ());
        let mut slot = worker.try_claim().unwrap();
        worker.assign(&mut slot, Some(1), Token::ZERO);

        let finished = worker
            .compute(&computation, &runtime, slot, Token::ZERO, Duration::from_millis(5))
            .await;
        assert_eq!(finished.outcome, JobOutcome::TimedOut);
    }
}
