use crate::{Token, TokenGenerator};
use portable_atomic::{AtomicU64, Ordering};

/// A lock-free [`TokenGenerator`] suitable for concurrent callers.
///
/// The counter lives in a single [`AtomicU64`], so any number of threads may
/// call [`TokenGenerator::next_token`] at once and still observe a total
/// order. This is the generator every [`WorkerPool`] owns.
///
/// ## Features
///
/// - ✅ Thread-safe
/// - ✅ Never blocks
///
/// ## See Also
/// - [`BasicTokenGenerator`]
///
/// [`WorkerPool`]: crate::WorkerPool
/// [`BasicTokenGenerator`]: crate::BasicTokenGenerator
#[derive(Debug, Default)]
pub struct AtomicTokenGenerator {
    next: AtomicU64,
}

impl AtomicTokenGenerator {
    /// Creates a generator whose first token is [`Token::ZERO`].
    ///
    /// # Example
    ///
    /// ```
    /// use framepool::{AtomicTokenGenerator, Token, TokenGenerator};
    ///
    /// let tokens = AtomicTokenGenerator::new();
    /// assert_eq!(tokens.next_token(), Token::ZERO);
    /// assert!(tokens.next_token() > Token::ZERO);
    /// ```
    pub const fn new() -> Self {
        Self::starting_at(Token::ZERO)
    }

    /// Creates a generator whose first token is `first`.
    ///
    /// Useful when restarting a feed whose consumers already saw tokens up to
    /// some value.
    pub const fn starting_at(first: Token) -> Self {
        Self {
            next: AtomicU64::new(first.to_raw()),
        }
    }
}

impl TokenGenerator for AtomicTokenGenerator {
    fn next_token(&self) -> Token {
        // A single RMW on one location is totally ordered on its own; no
        // other memory is published through the counter.
        Token::from_raw(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn peek(&self) -> Token {
        Token::from_raw(self.next.load(Ordering::Relaxed))
    }
}
