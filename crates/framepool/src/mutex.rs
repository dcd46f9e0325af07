#[cfg(feature = "parking-lot")]
use parking_lot::{Mutex as Inner, MutexGuard};
#[cfg(not(feature = "parking-lot"))]
use std::sync::{Mutex as Inner, MutexGuard, PoisonError};

/// Crate-private mutex that is `parking_lot` backed when the `parking-lot`
/// feature is enabled and `std` backed otherwise.
///
/// Poisoning is recovered rather than surfaced: every critical section in
/// this crate leaves the guarded state consistent before anything that may
/// panic runs.
#[derive(Debug, Default)]
pub(crate) struct Mutex<T>(Inner<T>);

impl<T> Mutex<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(Inner::new(value))
    }

    #[cfg(feature = "parking-lot")]
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }

    #[cfg(not(feature = "parking-lot"))]
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
