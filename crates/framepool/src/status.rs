use crate::Token;

/// The outcome of [`WorkerPool::supply`].
///
/// Supplying never blocks and never fails; this status only tells the
/// caller what the pool did with the input.
///
/// # Example
///
/// ```
/// use framepool::{OverloadAction, SupplyStatus, Token};
///
/// let status = SupplyStatus::Overloaded { token: Token::from_raw(3), action: OverloadAction::Dropped };
/// assert_eq!(status.token(), Some(Token::from_raw(3)));
/// assert!(!status.is_dispatched());
/// ```
///
/// [`WorkerPool::supply`]: crate::WorkerPool::supply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupplyStatus {
    /// The input was handed to a worker and its job is running.
    Dispatched {
        /// Token assigned to the input.
        token: Token,
        /// Index of the worker that runs the job.
        worker: usize,
    },
    /// Every worker was busy and the pool was at capacity; the input went to
    /// the overload policy instead.
    Overloaded {
        /// Token assigned to the input.
        token: Token,
        /// What the overload policy did with it.
        action: OverloadAction,
    },
    /// The pool is shutting down and no longer accepts input.
    Closed,
}

impl SupplyStatus {
    /// Returns the token assigned to the input, if one was assigned.
    pub const fn token(&self) -> Option<Token> {
        match self {
            Self::Dispatched { token, .. } | Self::Overloaded { token, .. } => Some(*token),
            Self::Closed => None,
        }
    }

    /// Returns `true` if a worker picked up the input.
    pub const fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched { .. })
    }
}

/// What an [`OverloadPolicy`] did with an input it could not process.
///
/// [`OverloadPolicy`]: crate::OverloadPolicy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverloadAction {
    /// The input was discarded; the retained output is unchanged.
    #[default]
    Dropped,
    /// The retained output was rewritten from the input. The retained token
    /// advances to the input's token.
    Replaced,
}

/// The terminal state of a single job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The computation finished before its deadline.
    Completed,
    /// The computation returned an error or panicked.
    Failed,
    /// The deadline passed first; the output is discarded.
    TimedOut,
    /// The worker had no stored input to run against.
    Skipped,
}
