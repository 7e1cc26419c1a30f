//! The token model: positions and the six token variants rules operate over.
//!
//! Tokens are produced by a tokenizer that sits outside this crate (see
//! `spec.md` §1, "Out of scope") and are immutable once a matcher sees them.
//! An action may replace a matched span wholesale with new tokens, but it
//! never mutates a `Token` in place.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A source location: line, column-on-that-line, and an absolute offset,
/// all zero-based. `spec.md` §3 requires these to be non-negative and
/// monotone non-decreasing across a stream; this crate enforces
/// non-negativity at construction (via `usize`) and leaves monotonicity as
/// a caller invariant, since it spans multiple tokens rather than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character_in_line: usize,
    pub absolute_character: usize,
}

impl Position {
    #[must_use]
    pub fn new(line: usize, character_in_line: usize, absolute_character: usize) -> Self {
        Self {
            line,
            character_in_line,
            absolute_character,
        }
    }

    /// A copy of this position shifted forward on the same line by `delta`
    /// characters. Used by the `Split` action to derive positions for the
    /// pieces of a token it splits.
    #[must_use]
    pub fn advanced_by(&self, delta: usize) -> Self {
        Self {
            line: self.line,
            character_in_line: self.character_in_line + delta,
            absolute_character: self.absolute_character + delta,
        }
    }
}

/// The escape sentinel recognized by [`Token::escaped`].
pub const ESCAPE_SENTINEL: char = '\\';

/// A single lexical unit, in one of the six variants `spec.md` §3 names.
///
/// Equality is structural: same variant, same value, same position (for
/// wrappers, same inner token plus the same wrapper payload) — exactly the
/// "by variant + value + position" rule in §4.1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// A plain token: just a value and an optional position.
    Simple {
        value: String,
        position: Option<Position>,
    },
    /// A token whose value begins with [`ESCAPE_SENTINEL`] and is at least
    /// two characters long.
    Escaped {
        value: String,
        position: Option<Position>,
    },
    /// An inner token decorated with a key-to-value metadata map.
    Annotated {
        inner: Box<Token>,
        metadata: std::collections::BTreeMap<String, String>,
    },
    /// An inner token decorated with an integer index.
    Indexed { inner: Box<Token>, index: usize },
    /// A token invisible to a stream's cursor operations (whitespace,
    /// comments, ...). Still present in `get_all_tokens` and counted in
    /// `size`.
    Shadow { inner: Box<Token> },
    /// A synthetic run of children produced by the `group` combinator or
    /// the `Grouping` action. `value()` is the concatenation of the
    /// children's values; `position()` spans them.
    Group {
        children: Vec<Token>,
        position: Option<Position>,
    },
}

impl Token {
    /// An unpositioned [`Token::Simple`]. Fails if `value` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EngineError::InvalidArgument`] if `value` is empty.
    pub fn unpositioned(value: impl Into<String>) -> crate::error::EngineResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(crate::error::EngineError::InvalidArgument(
                "token value must not be empty".to_string(),
            ));
        }
        Ok(Token::Simple {
            value,
            position: None,
        })
    }

    /// A positioned [`Token::Simple`]. Fails on an empty value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EngineError::InvalidArgument`] if `value` is empty.
    /// Negative indices are impossible by construction since the fields are `usize`.
    pub fn positioned(
        value: impl Into<String>,
        line: usize,
        character_in_line: usize,
        absolute_character: usize,
    ) -> crate::error::EngineResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(crate::error::EngineError::InvalidArgument(
                "token value must not be empty".to_string(),
            ));
        }
        Ok(Token::Simple {
            value,
            position: Some(Position::new(line, character_in_line, absolute_character)),
        })
    }

    /// An escaped token. Fails if `value` doesn't begin with
    /// [`ESCAPE_SENTINEL`] or is shorter than two characters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EngineError::InvalidArgument`] on a malformed escape value.
    pub fn escaped(
        value: impl Into<String>,
        position: Option<Position>,
    ) -> crate::error::EngineResult<Self> {
        let value = value.into();
        if value.chars().count() < 2 || !value.starts_with(ESCAPE_SENTINEL) {
            return Err(crate::error::EngineError::InvalidArgument(format!(
                "escaped token value `{value}` must start with `{ESCAPE_SENTINEL}` and be at least 2 characters"
            )));
        }
        Ok(Token::Escaped { value, position })
    }

    /// Wraps `inner` with a metadata map, producing [`Token::Annotated`].
    #[must_use]
    pub fn wrap_annotated(
        inner: Token,
        metadata: std::collections::BTreeMap<String, String>,
    ) -> Self {
        Token::Annotated {
            inner: Box::new(inner),
            metadata,
        }
    }

    /// Wraps `inner` with an integer index, producing [`Token::Indexed`].
    #[must_use]
    pub fn wrap_indexed(inner: Token, index: usize) -> Self {
        Token::Indexed {
            inner: Box::new(inner),
            index,
        }
    }

    /// Marks `inner` as a shadow token, invisible to stream cursor operations.
    #[must_use]
    pub fn shadow(inner: Token) -> Self {
        Token::Shadow {
            inner: Box::new(inner),
        }
    }

    /// Groups `children` into a single synthetic [`Token::Group`]. The
    /// group's position spans the first and last children that carry one;
    /// an all-unpositioned span yields `None`.
    #[must_use]
    pub fn group(children: Vec<Token>) -> Self {
        // Span anchor is the first positioned child; there's no separate
        // end-position field, so a group's position marks where it begins.
        let position = children.iter().find_map(Token::position);
        Token::Group { children, position }
    }

    /// The value visible to consumers: the stored value for `Simple` and
    /// `Escaped`, the inner value for wrappers, and the concatenation of
    /// children for `Group`.
    #[must_use]
    pub fn value(&self) -> String {
        match self {
            Token::Simple { value, .. } | Token::Escaped { value, .. } => value.clone(),
            Token::Annotated { inner, .. }
            | Token::Indexed { inner, .. }
            | Token::Shadow { inner } => inner.value(),
            Token::Group { children, .. } => children.iter().map(Token::value).collect(),
        }
    }

    /// The position visible to consumers, following the same delegation
    /// rule as [`Token::value`].
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        match self {
            Token::Simple { position, .. } | Token::Escaped { position, .. } => *position,
            Token::Annotated { inner, .. }
            | Token::Indexed { inner, .. }
            | Token::Shadow { inner } => inner.position(),
            Token::Group { position, .. } => *position,
        }
    }

    /// `true` iff this token (or a token it wraps) is a [`Token::Shadow`].
    #[must_use]
    pub fn is_shadow(&self) -> bool {
        matches!(self, Token::Shadow { .. })
    }

    /// The innermost non-wrapper token, unwrapping `Annotated`/`Indexed`/`Shadow`.
    #[must_use]
    pub fn innermost(&self) -> &Token {
        match self {
            Token::Annotated { inner, .. }
            | Token::Indexed { inner, .. }
            | Token::Shadow { inner } => inner.innermost(),
            other => other,
        }
    }

    /// Line number of this token's position, if any.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        self.position().map(|p| p.line)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}
