use crate::{Token, TokenGenerator};
use core::cell::Cell;

/// A single-threaded [`TokenGenerator`].
///
/// Backed by a [`Cell`], so it is `!Sync` and can only be shared within one
/// thread. Use it when exactly one producer hands out tokens, e.g. a capture
/// loop that stamps frames before fanning them out.
///
/// ## Features
///
/// - ❌ Thread-safe
/// - ✅ No atomic operations
///
/// ## See Also
/// - [`AtomicTokenGenerator`]
///
/// [`AtomicTokenGenerator`]: crate::AtomicTokenGenerator
#[derive(Debug, Default)]
pub struct BasicTokenGenerator {
    next: Cell<u64>,
}

impl BasicTokenGenerator {
    /// Creates a generator whose first token is [`Token::ZERO`].
    pub const fn new() -> Self {
        Self::starting_at(Token::ZERO)
    }

    /// Creates a generator whose first token is `first`.
    pub const fn starting_at(first: Token) -> Self {
        Self {
            next: Cell::new(first.to_raw()),
        }
    }
}

impl TokenGenerator for BasicTokenGenerator {
    fn next_token(&self) -> Token {
        let current = self.next.get();
        self.next.set(current.wrapping_add(1));
        Token::from_raw(current)
    }

    fn peek(&self) -> Token {
        Token::from_raw(self.next.get())
    }
}
