//! Error taxonomy for the token rule engine.
//!
//! Construction-time failures (bad regex, malformed combinators, duplicate
//! rule names) are fatal to the caller and surface as [`EngineError`].
//! Runtime matching failures are *values*, never errors: a rule that fails
//! to match returns `None` from [`crate::rule::TokenRule::try_match`], and
//! the engine never turns that into an `Err`.

use thiserror::Error;

/// Everything that can go wrong building or driving a grammar.
///
/// `NoMatch` is deliberately absent from this enum — per the engine's
/// contract, a failed match is represented as `Option::None`, not as an
/// error variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A null/empty required input, a duplicate rule name, an empty
    /// capture/reference key, a negative index, or an invalid regex.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A structurally forbidden combinator, e.g. a `sequence` with fewer
    /// than two rules or a `repeat` whose `max` is below `max(1, min)`.
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// `read_token`/`current_token` were called past the last non-shadow
    /// token in the stream.
    #[error("end of stream")]
    EndOfStream,

    /// A mutating operation was attempted on a stream built as immutable.
    #[error("stream is immutable")]
    Immutable,
}

/// Convenience alias used throughout the crate's construction-time APIs.
pub type EngineResult<T> = Result<T, EngineError>;
