//! Token actions: map a successful [`TokenRuleMatch`] to a replacement token list.

use crate::context::TokenRuleContext;
use crate::rule::TokenRuleMatch;
use crate::token::Token;
use regex::Regex;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A transformer from a match (plus the full `[start_index, end_index)`
/// span, shadow tokens included, and the context) to the tokens that
/// replace it in the grammar's output.
pub trait TokenAction: fmt::Debug {
    fn apply(&self, m: &TokenRuleMatch, span: &[Token], ctx: &mut TokenRuleContext) -> Vec<Token>;

    fn describe(&self) -> String;

    /// Enables [`crate::grammar::GrammarBuilder::define`] to detect a
    /// `Grouping` action by downcast rather than by string-matching `describe()`.
    fn as_any(&self) -> &dyn Any;
}

pub type ActionRef = Rc<dyn TokenAction>;

/// Returns `match.matched_tokens` unchanged.
#[derive(Debug)]
pub struct IdentityAction;

impl TokenAction for IdentityAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        m.matched_tokens.clone()
    }

    fn describe(&self) -> String {
        "identity".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn identity() -> ActionRef {
    Rc::new(IdentityAction)
}

/// Which tokens a [`GroupingAction`] wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingMode {
    /// Only the rule's matched (non-shadow) tokens.
    Matched,
    /// Every token in `[start_index, end_index)`, shadow tokens included.
    All,
}

/// Wraps the selected tokens in a single [`Token::Group`].
#[derive(Debug)]
pub struct GroupingAction {
    mode: GroupingMode,
}

impl TokenAction for GroupingAction {
    fn apply(&self, m: &TokenRuleMatch, span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        let children = match self.mode {
            GroupingMode::Matched => m.matched_tokens.clone(),
            GroupingMode::All => span.to_vec(),
        };
        vec![Token::group(children)]
    }

    fn describe(&self) -> String {
        format!("grouping({:?})", self.mode)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn grouping(mode: GroupingMode) -> ActionRef {
    Rc::new(GroupingAction { mode })
}

/// A predicate over a single matched token, used by [`filter`]/[`skip`]/[`extract`].
pub type TokenPredicate = Rc<dyn Fn(&Token) -> bool>;

/// Keeps tokens satisfying `predicate`.
#[derive(Clone)]
pub struct FilterAction {
    predicate: TokenPredicate,
}

impl fmt::Debug for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterAction").finish_non_exhaustive()
    }
}

impl TokenAction for FilterAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        m.matched_tokens
            .iter()
            .filter(|t| (self.predicate)(t))
            .cloned()
            .collect()
    }

    fn describe(&self) -> String {
        "filter".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn filter(predicate: impl Fn(&Token) -> bool + 'static) -> ActionRef {
    Rc::new(FilterAction {
        predicate: Rc::new(predicate),
    })
}

/// Drops tokens satisfying `predicate` — the inverse of [`filter`].
#[derive(Clone)]
pub struct SkipAction {
    predicate: TokenPredicate,
}

impl fmt::Debug for SkipAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipAction").finish_non_exhaustive()
    }
}

impl TokenAction for SkipAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        m.matched_tokens
            .iter()
            .filter(|t| !(self.predicate)(t))
            .cloned()
            .collect()
    }

    fn describe(&self) -> String {
        "skip".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn skip(predicate: impl Fn(&Token) -> bool + 'static) -> ActionRef {
    Rc::new(SkipAction {
        predicate: Rc::new(predicate),
    })
}

/// A sink invoked once per token removed by [`ExtractAction`]. Shared via
/// `Rc<RefCell<_>>` by callers that want to inspect what was extracted.
pub type ExtractSink = Rc<dyn Fn(&Token)>;

/// Drops tokens satisfying `predicate`, same as [`skip`], but calls `sink`
/// once for every token it removes (the ones `predicate` matched) — the
/// only impure built-in action besides [`Transform`].
#[derive(Clone)]
pub struct ExtractAction {
    predicate: TokenPredicate,
    sink: ExtractSink,
}

impl fmt::Debug for ExtractAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractAction").finish_non_exhaustive()
    }
}

impl TokenAction for ExtractAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        let mut kept = Vec::with_capacity(m.matched_tokens.len());
        for token in &m.matched_tokens {
            if (self.predicate)(token) {
                (self.sink)(token);
            } else {
                kept.push(token.clone());
            }
        }
        kept
    }

    fn describe(&self) -> String {
        "extract".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn extract(predicate: impl Fn(&Token) -> bool + 'static, sink: ExtractSink) -> ActionRef {
    Rc::new(ExtractAction {
        predicate: Rc::new(predicate),
        sink,
    })
}

/// Applies `f` to each matched token independently.
#[derive(Clone)]
pub struct ConvertAction {
    f: Rc<dyn Fn(&Token) -> Token>,
}

impl fmt::Debug for ConvertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertAction").finish_non_exhaustive()
    }
}

impl TokenAction for ConvertAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        m.matched_tokens.iter().map(|t| (self.f)(t)).collect()
    }

    fn describe(&self) -> String {
        "convert".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn convert(f: impl Fn(&Token) -> Token + 'static) -> ActionRef {
    Rc::new(ConvertAction { f: Rc::new(f) })
}

/// Splits each matched token's value on `regex`, emitting one token per
/// non-empty piece and deriving each piece's position from its actual
/// character offset into the original value — the separators' widths count
/// toward that offset, they're just not emitted as tokens themselves.
#[derive(Debug)]
pub struct SplitAction {
    regex: Regex,
}

impl TokenAction for SplitAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        let mut out = Vec::new();
        for token in &m.matched_tokens {
            let value = token.value();
            let base_position = token.position();
            let mut last_end = 0usize;
            let mut piece_starts: Vec<(usize, usize)> = Vec::new();
            for sep in self.regex.find_iter(&value) {
                piece_starts.push((last_end, sep.start()));
                last_end = sep.end();
            }
            piece_starts.push((last_end, value.len()));

            for (start_byte, end_byte) in piece_starts {
                let piece = &value[start_byte..end_byte];
                if !piece.is_empty() {
                    let char_offset = value[..start_byte].chars().count();
                    let position = base_position.map(|p| p.advanced_by(char_offset));
                    out.push(Token::Simple {
                        value: piece.to_string(),
                        position,
                    });
                }
            }
        }
        out
    }

    fn describe(&self) -> String {
        "split".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Splits on `pattern`, a regular expression (not whole-match anchored:
/// the separator is searched for anywhere in the value, same as
/// `regex::Regex::find_iter`).
///
/// # Errors
///
/// Returns [`crate::error::EngineError::InvalidArgument`] if `pattern` doesn't compile.
pub fn split(pattern: &str) -> crate::error::EngineResult<ActionRef> {
    let regex = Regex::new(pattern).map_err(|err| {
        crate::error::EngineError::InvalidArgument(format!("invalid split pattern: {err}"))
    })?;
    Ok(Rc::new(SplitAction { regex }))
}

/// Applies `g` to the whole matched list at once; opaque to the engine.
#[derive(Clone)]
pub struct TransformAction {
    g: Rc<dyn Fn(Vec<Token>) -> Vec<Token>>,
}

impl fmt::Debug for TransformAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformAction").finish_non_exhaustive()
    }
}

impl TokenAction for TransformAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        (self.g)(m.matched_tokens.clone())
    }

    fn describe(&self) -> String {
        "transform".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn transform(g: impl Fn(Vec<Token>) -> Vec<Token> + 'static) -> ActionRef {
    Rc::new(TransformAction { g: Rc::new(g) })
}

/// Returns `[prefix, ...matched, suffix]`.
#[derive(Debug)]
pub struct WrapAction {
    prefix: Token,
    suffix: Token,
}

impl TokenAction for WrapAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        let mut out = Vec::with_capacity(m.matched_tokens.len() + 2);
        out.push(self.prefix.clone());
        out.extend(m.matched_tokens.clone());
        out.push(self.suffix.clone());
        out
    }

    fn describe(&self) -> String {
        "wrap".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn wrap(prefix: Token, suffix: Token) -> ActionRef {
    Rc::new(WrapAction { prefix, suffix })
}

/// Wraps each matched token in `Annotated`, merging `metadata` into any
/// existing annotation payload — keys in `metadata` win.
#[derive(Debug)]
pub struct AnnotateAction {
    metadata: BTreeMap<String, String>,
}

impl TokenAction for AnnotateAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        m.matched_tokens
            .iter()
            .map(|token| match token {
                Token::Annotated { inner, metadata } => {
                    let mut merged = metadata.clone();
                    for (k, v) in &self.metadata {
                        merged.insert(k.clone(), v.clone());
                    }
                    Token::wrap_annotated((**inner).clone(), merged)
                }
                other => Token::wrap_annotated(other.clone(), self.metadata.clone()),
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("annotate({} keys)", self.metadata.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn annotate(metadata: BTreeMap<String, String>) -> ActionRef {
    Rc::new(AnnotateAction { metadata })
}

/// Wraps each matched token in `Indexed` starting from `start`, incrementing
/// per token; tokens already `Indexed` pass through unchanged.
#[derive(Debug)]
pub struct IndexAction {
    start: usize,
}

impl TokenAction for IndexAction {
    fn apply(&self, m: &TokenRuleMatch, _span: &[Token], _ctx: &mut TokenRuleContext) -> Vec<Token> {
        let mut next = self.start;
        m.matched_tokens
            .iter()
            .map(|token| {
                if matches!(token, Token::Indexed { .. }) {
                    token.clone()
                } else {
                    let wrapped = Token::wrap_indexed(token.clone(), next);
                    next += 1;
                    wrapped
                }
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("index(start={})", self.start)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn index(start: usize) -> ActionRef {
    Rc::new(IndexAction { start })
}
