use core::fmt;

/// A submission-order identifier assigned to every input supplied to a pool.
///
/// Tokens are handed out by a [`TokenGenerator`] and are strictly increasing
/// for the lifetime of the generator, so comparing two tokens tells which
/// input was submitted first regardless of which job finished first.
///
/// "No result yet" is modelled as `Option<Token>::None`, which orders below
/// every valid token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(transparent)]
pub struct Token(u64);

impl Token {
    /// The first token a fresh generator hands out.
    pub const ZERO: Self = Self(0);

    /// Creates a token from its raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this token.
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Returns the token that follows this one.
    ///
    /// Wraps on overflow; 64 bits are not expected to run out for the
    /// lifetime of a frame feed.
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<Token> for u64 {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// A minimal interface for producing submission-order [`Token`]s.
pub trait TokenGenerator {
    /// Returns the next token. Every call yields a token strictly greater
    /// than the previous one.
    fn next_token(&self) -> Token;

    /// Returns the token the next call to [`Self::next_token`] will yield,
    /// without consuming it.
    fn peek(&self) -> Token;
}
