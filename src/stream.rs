//! [`TokenStream`]: a cursor over a token sequence with shadow-skipping.
//!
//! The backing sequence is held in an `Rc<[Token]>` so that forking a
//! stream for a trial match (the pattern every rule in [`crate::rule`]
//! uses: fork, attempt, commit-on-success) is an `O(1)` reference clone,
//! not a copy of the token vector.

use crate::error::{EngineError, EngineResult};
use crate::token::Token;
use std::rc::Rc;

/// Cursor over an ordered token sequence.
///
/// `current_index` always sits at a non-shadow index (or at `size()` when
/// none remain) — every method that moves the cursor restores that
/// invariant, which is what lets `current_token`/`has_more_tokens` ignore
/// shadow tokens without re-deriving the skip on every call.
#[derive(Debug, Clone)]
pub struct TokenStream {
    backing: Rc<[Token]>,
    current_index: usize,
    mutable: bool,
}

impl TokenStream {
    /// A fresh, mutable stream over `tokens`, with the cursor snapped
    /// forward to the first non-shadow token.
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::from_backing(Rc::from(tokens), 0, true)
    }

    /// A read-only view over `tokens`: `advance_to`/`read_token`/`reset`
    /// all fail with [`EngineError::Immutable`].
    #[must_use]
    pub fn new_immutable(tokens: Vec<Token>) -> Self {
        Self::from_backing(Rc::from(tokens), 0, false)
    }

    pub(crate) fn from_rc(backing: Rc<[Token]>, index: usize) -> Self {
        Self::from_backing(backing, index, true)
    }

    fn from_backing(backing: Rc<[Token]>, index: usize, mutable: bool) -> Self {
        let mut stream = Self {
            backing,
            current_index: 0,
            mutable,
        };
        stream.current_index = stream.skip_shadow_from(index.min(stream.size()));
        stream
    }

    fn skip_shadow_from(&self, mut index: usize) -> usize {
        let size = self.backing.len();
        while index < size && self.backing[index].is_shadow() {
            index += 1;
        }
        index
    }

    /// Number of tokens backing the stream, shadow tokens included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.backing.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backing.is_empty()
    }

    /// A read-only snapshot of every backing token, shadow tokens included.
    #[must_use]
    pub fn get_all_tokens(&self) -> &[Token] {
        &self.backing
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Moves the cursor to `index`, clamped to `[0, size]`, then snaps
    /// forward to the next non-shadow position.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Immutable`] if the stream was built with
    /// [`TokenStream::new_immutable`].
    pub fn advance_to(&mut self, index: usize) -> EngineResult<()> {
        if !self.mutable {
            return Err(EngineError::Immutable);
        }
        self.current_index = self.skip_shadow_from(index.min(self.size()));
        Ok(())
    }

    /// Moves the cursor by a signed offset from its current position.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Immutable`] if the stream is immutable.
    pub fn move_by(&mut self, offset: isize) -> EngineResult<()> {
        let base = self.current_index as isize + offset;
        self.advance_to(base.max(0) as usize)
    }

    /// Moves the cursor back to the start.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Immutable`] if the stream is immutable.
    pub fn reset(&mut self) -> EngineResult<()> {
        self.advance_to(0)
    }

    /// `true` iff a non-shadow token exists at or after the cursor.
    #[must_use]
    pub fn has_more_tokens(&self) -> bool {
        self.current_index < self.size()
    }

    /// The current non-shadow token, without moving the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EndOfStream`] if no non-shadow token remains.
    pub fn current_token(&self) -> EngineResult<&Token> {
        self.backing
            .get(self.current_index)
            .ok_or(EngineError::EndOfStream)
    }

    /// Returns the current token and advances past it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Immutable`] on an immutable stream, or
    /// [`EngineError::EndOfStream`] if no non-shadow token remains.
    pub fn read_token(&mut self) -> EngineResult<Token> {
        if !self.mutable {
            return Err(EngineError::Immutable);
        }
        let token = self.current_token()?.clone();
        self.current_index = self.skip_shadow_from(self.current_index + 1);
        Ok(token)
    }

    /// The previous non-shadow token in the full backing sequence, if any.
    #[must_use]
    pub fn previous_non_shadow(&self) -> Option<&Token> {
        self.backing[..self.current_index.min(self.size())]
            .iter()
            .rev()
            .find(|t| !t.is_shadow())
    }

    /// The line number the previous non-shadow token sits on, used by
    /// `StartAnchor(Line)` to decide whether the cursor opens a new line.
    #[must_use]
    pub fn previous_line(&self) -> Option<usize> {
        self.previous_non_shadow().and_then(Token::line)
    }

    /// The next non-shadow token strictly after the cursor, used by
    /// `EndAnchor(Line)`.
    #[must_use]
    pub fn next_non_shadow(&self) -> Option<&Token> {
        let after = self.skip_shadow_from(self.current_index + 1);
        self.backing.get(after)
    }

    #[must_use]
    pub fn copy_with_index(&self, index: usize) -> Self {
        Self::from_backing(self.backing.clone(), index, self.mutable)
    }

    #[must_use]
    pub fn copy_with_offset(&self, offset: isize) -> Self {
        let index = (self.current_index as isize + offset).max(0) as usize;
        self.copy_with_index(index)
    }

    #[must_use]
    pub fn copy_from_zero(&self) -> Self {
        self.copy_with_index(0)
    }

    /// A stream over the full backing sequence in reverse order, with the
    /// cursor mapped to the token that was at `current_index` before the
    /// reversal.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let reversed: Vec<Token> = self.backing.iter().rev().cloned().collect();
        let mapped_index = self.size().saturating_sub(self.current_index);
        Self::from_backing(Rc::from(reversed), mapped_index, self.mutable)
    }

    /// A fresh stream over `[current_index, size)`, index `0`. Used by the
    /// `Lookahead` combinator.
    #[must_use]
    pub fn create_lookahead_stream(&self) -> Self {
        let ahead: Vec<Token> = self.backing[self.current_index..].to_vec();
        Self::from_backing(Rc::from(ahead), 0, true)
    }

    /// A fresh stream over the reverse of `[0, current_index)`, index `0`.
    /// Used by the `Lookbehind` combinator; reversing the slice (shadow
    /// tokens included) before re-deriving shadow-skipping keeps lookbehind
    /// consistent with a forward scan from the stream's start.
    #[must_use]
    pub fn create_lookbehind_stream(&self) -> Self {
        let mut behind: Vec<Token> = self.backing[..self.current_index].to_vec();
        behind.reverse();
        Self::from_backing(Rc::from(behind), 0, true)
    }

    /// A cheap, forcibly-mutable working copy used internally by rule
    /// implementations to attempt a match without touching `self` unless
    /// it succeeds. See [`TokenStream::commit`].
    pub(crate) fn fork(&self) -> Self {
        let mut forked = self.clone();
        forked.mutable = true;
        forked
    }

    /// Adopts `trial`'s cursor position after a successful match attempted
    /// via [`TokenStream::fork`]. Bypasses the immutability check: the
    /// check guards direct callers of the mutating API, not the engine's
    /// own commit-on-success protocol.
    pub(crate) fn commit(&mut self, trial: Self) {
        self.current_index = trial.current_index;
    }
}
