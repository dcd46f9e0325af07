use core::sync::atomic::Ordering;
use portable_atomic::AtomicU64;

/// A point-in-time view of a pool's counters.
///
/// Every supplied input ends up in exactly one of `dispatched` or
/// `overloaded`. Every dispatched job ends up in exactly one of
/// `completed`, `stale`, `failed`, `timed_out` or `skipped` once it is
/// over, so `busy` is what remains in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// Workers created so far.
    pub workers: usize,
    /// Workers currently running a job.
    pub busy: usize,
    /// Calls to `supply` and `refresh` accepted while open.
    pub supplied: u64,
    /// Jobs handed to a worker.
    pub dispatched: u64,
    /// Inputs turned away because the pool was saturated.
    pub overloaded: u64,
    /// Jobs whose output became the retained result.
    pub completed: u64,
    /// Jobs that completed after a newer result was already retained.
    pub stale: u64,
    /// Jobs whose computation returned an error or panicked.
    pub failed: u64,
    /// Jobs cancelled or discarded at their deadline.
    pub timed_out: u64,
    /// Refreshes that landed on a worker without a stored input.
    pub skipped: u64,
}

impl PoolStats {
    /// Jobs that have run to one of their terminal states.
    pub const fn finished(&self) -> u64 {
        self.completed + self.stale + self.failed + self.timed_out + self.skipped
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) supplied: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) overloaded: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) stale: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) timed_out: AtomicU64,
    pub(crate) skipped: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, workers: usize, busy: usize) -> PoolStats {
        PoolStats {
            workers,
            busy,
            supplied: self.supplied.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            overloaded: self.overloaded.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}
