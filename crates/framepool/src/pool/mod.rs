mod builder;
mod stats;

pub use builder::*;
pub use stats::*;

use crate::{
    AtomicTokenGenerator, Computation, Deadline, Error, FailurePolicy, JobOutcome,
    OverloadAction, OverloadPolicy, Raced, Result, Runtime, SupplyStatus, Token,
    TokenGenerator, Worker,
    mutex::Mutex,
    worker::{Finished, Slot},
};
use builder::Factory;
use core::{
    fmt, mem,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::instrument;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// The retained result of a pool together with the token of the input it
/// was computed from. `token` is `None` until the first result lands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Retained<O> {
    pub token: Option<Token>,
    pub output: O,
}

struct Shared<C: Computation, R: Runtime> {
    computation: C,
    runtime: R,
    config: PoolConfig,
    tokens: AtomicTokenGenerator,
    workers: Mutex<Vec<Arc<Worker<C>>>>,
    retained: Mutex<Retained<C::Output>>,
    overload: Box<dyn OverloadPolicy<C::Input, C::Output>>,
    output_factory: Factory<C::Output>,
    aux_factory: Factory<C::Aux>,
    busy: AtomicUsize,
    closed: AtomicBool,
    counters: Counters,
}

/// A bounded pool of reusable workers that always exposes the freshest
/// result.
///
/// [`supply`] never blocks and never queues: the input goes to the first
/// idle worker (a new one is created while below `max_workers`), or to the
/// [`OverloadPolicy`] when every worker is busy. Each job is raced against
/// the configured timeout on the injected [`Runtime`]. A finished job
/// replaces the retained result only if its input was supplied after the
/// input of the result currently retained, so [`retrieve`] is monotonic in
/// submission order even though jobs finish in any order.
///
/// The handle is cheap to clone; clones share the same pool.
///
/// [`supply`]: Self::supply
/// [`retrieve`]: Self::retrieve
pub struct WorkerPool<C: Computation, R: Runtime> {
    shared: Arc<Shared<C, R>>,
}

impl<C: Computation, R: Runtime> Clone for WorkerPool<C, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Computation, R: Runtime> WorkerPool<C, R> {
    /// Starts building a pool that runs `computation` on `runtime`.
    pub fn builder(runtime: R, computation: C) -> PoolBuilder<C, R> {
        PoolBuilder::new(runtime, computation)
    }

    pub(crate) fn from_parts(
        runtime: R,
        computation: C,
        config: PoolConfig,
        output_factory: Factory<C::Output>,
        aux_factory: Factory<C::Aux>,
        overload: Box<dyn OverloadPolicy<C::Input, C::Output>>,
    ) -> Self {
        let retained = Retained {
            token: None,
            output: output_factory(),
        };
        Self {
            shared: Arc::new(Shared {
                computation,
                runtime,
                config,
                tokens: AtomicTokenGenerator::new(),
                workers: Mutex::new(Vec::with_capacity(config.max_workers)),
                retained: Mutex::new(retained),
                overload,
                output_factory,
                aux_factory,
                busy: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                counters: Counters::default(),
            }),
        }
    }

    /// Supplies the next input.
    ///
    /// Assigns it a fresh [`Token`] and either dispatches it to a worker or,
    /// if the pool is saturated, hands it to the overload policy. Returns
    /// [`SupplyStatus::Closed`] without consuming a token once [`close`] has
    /// been called.
    ///
    /// [`close`]: Self::close
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn supply(&self, input: C::Input) -> SupplyStatus {
        let shared = &self.shared;
        if shared.closed.load(Ordering::Acquire) {
            return SupplyStatus::Closed;
        }
        Counters::bump(&shared.counters.supplied);
        let token = shared.tokens.next_token();

        match self.claim_worker() {
            Some((worker, mut slot)) => {
                worker.assign(&mut slot, Some(input), token);
                self.launch(worker, slot, token)
            }
            None => {
                let action = {
                    let mut retained = shared.retained.lock();
                    let action = shared.overload.on_overload(&mut retained.output, input);
                    if action == OverloadAction::Replaced {
                        retained.token = retained.token.max(Some(token));
                    }
                    action
                };
                Counters::bump(&shared.counters.overloaded);
                #[cfg(feature = "tracing")]
                tracing::debug!("Pool saturated, input {token} {action:?}");
                SupplyStatus::Overloaded { token, action }
            }
        }
    }

    /// Reruns the computation on an idle worker's stored input under a fresh
    /// token.
    ///
    /// Useful when the computation depends on state outside the input (for
    /// example a calibration that just changed). If the chosen worker never
    /// received an input the job is [`JobOutcome::Skipped`]. If every worker
    /// is busy nothing runs and `Overloaded { action: Dropped }` is returned.
    pub fn refresh(&self) -> SupplyStatus {
        let shared = &self.shared;
        if shared.closed.load(Ordering::Acquire) {
            return SupplyStatus::Closed;
        }
        Counters::bump(&shared.counters.supplied);
        let token = shared.tokens.next_token();

        match self.claim_worker() {
            Some((worker, mut slot)) => {
                worker.assign(&mut slot, None, token);
                self.launch(worker, slot, token)
            }
            None => {
                Counters::bump(&shared.counters.overloaded);
                SupplyStatus::Overloaded {
                    token,
                    action: OverloadAction::Dropped,
                }
            }
        }
    }

    /// Returns a clone of the retained output.
    ///
    /// Never blocks on running jobs; the lock is only held for the clone.
    pub fn retrieve(&self) -> C::Output
    where
        C::Output: Clone,
    {
        self.shared.retained.lock().output.clone()
    }

    /// Clones the retained output into `dst`, reusing its storage.
    pub fn retrieve_into(&self, dst: &mut C::Output)
    where
        C::Output: Clone,
    {
        dst.clone_from(&self.shared.retained.lock().output);
    }

    /// Runs `f` against the retained output and its token without copying.
    ///
    /// Jobs finishing while `f` runs wait for it, so keep it short.
    pub fn with_retained<T>(&self, f: impl FnOnce(&C::Output, Option<Token>) -> T) -> T {
        let retained = self.shared.retained.lock();
        f(&retained.output, retained.token)
    }

    /// Returns the retained output together with its token.
    pub fn snapshot(&self) -> Retained<C::Output>
    where
        C::Output: Clone,
    {
        self.shared.retained.lock().clone()
    }

    /// Token of the input the retained output was computed from.
    pub fn retained_token(&self) -> Option<Token> {
        self.shared.retained.lock().token
    }

    /// Busy workers as a percentage of `max_workers`.
    pub fn usage(&self) -> f64 {
        self.in_flight() as f64 / self.shared.config.max_workers as f64 * 100.0
    }

    /// Number of jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.shared.busy.load(Ordering::Acquire)
    }

    pub fn max_workers(&self) -> usize {
        self.shared.config.max_workers
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Number of workers created so far.
    pub fn workers(&self) -> usize {
        self.shared.workers.lock().len()
    }

    /// Returns the worker at `index`, if it has been created.
    pub fn worker(&self, index: usize) -> Option<Arc<Worker<C>>> {
        self.shared.workers.lock().get(index).cloned()
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.counters.snapshot(self.workers(), self.in_flight())
    }

    /// Stops accepting input. Jobs already running are left to finish.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::AcqRel) {
            #[cfg(feature = "tracing")]
            tracing::info!("Worker pool closed, refusing new input");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Waits until no job is in flight.
    ///
    /// Does not close the pool, so jobs supplied concurrently extend the
    /// wait.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DrainTimedOut`] if jobs are still running after
    /// `timeout`.
    pub async fn drain(&self, timeout: Duration) -> Result<()> {
        let runtime = &self.shared.runtime;
        let idle = async {
            while self.in_flight() > 0 {
                runtime.sleep(DRAIN_POLL_INTERVAL).await;
            }
        };

        match Deadline::new(idle, runtime.sleep(timeout)).await {
            Raced::Completed(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight jobs drained");
                Ok(())
            }
            Raced::Expired => {
                let in_flight = self.in_flight();
                #[cfg(feature = "tracing")]
                tracing::warn!("Drain timed out ({in_flight} jobs still in flight)");
                Err(Error::DrainTimedOut { timeout, in_flight })
            }
        }
    }

    /// Closes the pool and drains it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DrainTimedOut`] if jobs are still running after
    /// `timeout`. Those jobs still finish in the background, bounded by the
    /// job timeout.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.close();
        #[cfg(feature = "tracing")]
        tracing::info!("Draining worker pool ({} jobs in flight)", self.in_flight());
        self.drain(timeout).await?;
        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");
        Ok(())
    }

    /// Claims the lowest-index idle worker, creating one while below
    /// capacity.
    fn claim_worker(&self) -> Option<(Arc<Worker<C>>, Slot<C>)> {
        let shared = &self.shared;
        let mut workers = shared.workers.lock();

        let mut claimed = workers
            .iter()
            .find_map(|worker| worker.try_claim().map(|slot| (Arc::clone(worker), slot)));

        if claimed.is_none() && workers.len() < shared.config.max_workers {
            let worker = Arc::new(Worker::new(
                workers.len(),
                (shared.output_factory)(),
                (shared.aux_factory)(),
            ));
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Created worker {} of {}",
                worker.index(),
                shared.config.max_workers
            );
            workers.push(Arc::clone(&worker));
            claimed = worker.try_claim().map(|slot| (worker, slot));
        }

        if claimed.is_some() {
            shared.busy.fetch_add(1, Ordering::AcqRel);
        }
        claimed
    }

    fn launch(&self, worker: Arc<Worker<C>>, slot: Slot<C>, token: Token) -> SupplyStatus {
        let shared = Arc::clone(&self.shared);
        let index = worker.index();
        Counters::bump(&shared.counters.dispatched);
        #[cfg(feature = "tracing")]
        tracing::trace!("Dispatching {token} to worker {index}");

        self.shared.runtime.spawn(async move {
            let Finished {
                mut slot,
                token,
                outcome,
            } = worker
                .compute(
                    &shared.computation,
                    &shared.runtime,
                    slot,
                    token,
                    shared.config.job_timeout,
                )
                .await;
            shared.settle(&mut slot.output, token, outcome);
            // Under the workers lock so no claim can land between the worker
            // going idle and the busy count dropping.
            let _workers = shared.workers.lock();
            worker.release(slot);
            shared.busy.fetch_sub(1, Ordering::AcqRel);
        });

        SupplyStatus::Dispatched {
            token,
            worker: index,
        }
    }
}

impl<C: Computation, R: Runtime> Shared<C, R> {
    fn settle(&self, output: &mut C::Output, token: Token, outcome: JobOutcome) {
        let counters = &self.counters;
        match outcome {
            JobOutcome::Completed => {
                if self.commit(output, token) {
                    Counters::bump(&counters.completed);
                } else {
                    Counters::bump(&counters.stale);
                }
            }
            JobOutcome::Failed => {
                Counters::bump(&counters.failed);
                if self.config.failure_policy == FailurePolicy::Retain {
                    self.commit(output, token);
                }
            }
            JobOutcome::TimedOut => Counters::bump(&counters.timed_out),
            JobOutcome::Skipped => Counters::bump(&counters.skipped),
        }
    }

    /// Swaps `output` into the retained slot if `token` is newer. On success
    /// `output` receives the previously retained buffer for reuse.
    fn commit(&self, output: &mut C::Output, token: Token) -> bool {
        let mut retained = self.retained.lock();
        if retained.token >= Some(token) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Discarding stale result {token} (retained {:?})",
                retained.token
            );
            return false;
        }
        mem::swap(&mut retained.output, output);
        retained.token = Some(token);
        true
    }
}

impl<C: Computation, R: Runtime> fmt::Debug for WorkerPool<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.shared.config)
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
