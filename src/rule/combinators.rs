//! Combinators: rules built out of other rules.

use super::{Polarity, ReferenceKind, RuleExt, RuleRef, TokenRule, TokenRuleMatch};
use crate::context::TokenRuleContext;
use crate::error::EngineError;
use crate::stream::TokenStream;
use crate::token::Token;
use smallvec::SmallVec;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Matches exactly when `inner` does not, at the same position. Consumes one
/// non-shadow token on success, or matches empty at end of stream — the same
/// single-step cost `atoms::AlwaysMatchRule` charges, since "not X" has no
/// other principled width.
#[derive(Debug)]
pub struct NotRule {
    pub(super) inner: RuleRef,
}

impl TokenRule for NotRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let mut probe = stream.fork();
        if self.inner.try_match(&mut probe, ctx).is_some() {
            return None;
        }
        let mut trial = stream.fork();
        let start = trial.current_index();
        if !trial.has_more_tokens() {
            stream.commit(trial);
            return Some(TokenRuleMatch::new(start, start, vec![], self.describe()));
        }
        let token = trial.read_token().ok()?;
        let end = trial.current_index();
        stream.commit(trial);
        Some(TokenRuleMatch::new(start, end, vec![token], self.describe()))
    }

    fn describe(&self) -> String {
        format!("not({})", self.inner.describe())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// On success of `inner`, replaces the matched tokens with a single
/// [`Token::Group`] spanning them. The match's span (`start_index`/`end_index`)
/// is unchanged; only `matched_tokens` collapses to one element.
#[derive(Debug)]
pub struct GroupRule {
    pub(super) inner: RuleRef,
}

impl TokenRule for GroupRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let inner_match = self.inner.try_match(stream, ctx)?;
        let grouped = Token::group(inner_match.matched_tokens);
        Some(TokenRuleMatch::new(
            inner_match.start_index,
            inner_match.end_index,
            vec![grouped],
            self.describe(),
        ))
    }

    fn describe(&self) -> String {
        format!("group({})", self.inner.describe())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches each member in order, on the same stream, failing (and restoring
/// the stream to its entry position) if any member fails.
#[derive(Debug)]
pub struct SequenceRule {
    members: Vec<RuleRef>,
}

impl TokenRule for SequenceRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let mut trial = stream.fork();
        let start = trial.current_index();
        let mut matched: SmallVec<[Token; 4]> = SmallVec::new();
        for member in &self.members {
            let m = member.try_match(&mut trial, ctx)?;
            matched.extend(m.matched_tokens);
        }
        let end = trial.current_index();
        stream.commit(trial);
        Some(TokenRuleMatch::new(
            start,
            end,
            matched.into_vec(),
            self.describe(),
        ))
    }

    fn describe(&self) -> String {
        format!("sequence({})", self.members.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Sequential composition of `members`, all starting from the same position
/// and executed left to right.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if `members` is empty.
pub fn sequence(members: Vec<RuleRef>) -> Result<RuleRef, EngineError> {
    if members.is_empty() {
        return Err(EngineError::InvalidArgument(
            "sequence requires at least one member".to_string(),
        ));
    }
    Ok(Rc::new(SequenceRule { members }))
}

/// Ordered choice: tries each alternative in order, on a fresh fork from the
/// entry position, and commits the first success. PEG semantics, not
/// longest-match — `spec.md` §4.3 Open Questions, resolved in favor of
/// ordered choice since it's unambiguous and matches every pack rule engine
/// examined.
#[derive(Debug)]
pub struct AnyOfRule {
    alternatives: Vec<RuleRef>,
}

impl AnyOfRule {
    /// Exposed so [`crate::grammar::GrammarBuilder::define`] can detect the
    /// `any_of([rule, rule.group()])` shape without re-deriving it.
    #[must_use]
    pub fn alternatives(&self) -> &[RuleRef] {
        &self.alternatives
    }
}

impl TokenRule for AnyOfRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        for alt in &self.alternatives {
            let mut trial = stream.fork();
            if let Some(m) = alt.try_match(&mut trial, ctx) {
                stream.commit(trial);
                return Some(TokenRuleMatch::new(
                    m.start_index,
                    m.end_index,
                    m.matched_tokens,
                    self.describe(),
                ));
            }
        }
        None
    }

    fn describe(&self) -> String {
        format!("any_of({})", self.alternatives.len())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Ordered choice over `alternatives`, first match wins.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if `alternatives` is empty.
pub fn any_of(alternatives: Vec<RuleRef>) -> Result<RuleRef, EngineError> {
    if alternatives.is_empty() {
        return Err(EngineError::InvalidArgument(
            "any_of requires at least one alternative".to_string(),
        ));
    }
    Ok(Rc::new(AnyOfRule { alternatives }))
}

/// Matches `inner` if possible; on failure, matches empty at the current
/// index if a token remains there, and fails outright once the stream is
/// past its last non-shadow token.
#[derive(Debug)]
pub struct OptionalRule {
    inner: RuleRef,
}

impl TokenRule for OptionalRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let mut trial = stream.fork();
        if let Some(m) = self.inner.try_match(&mut trial, ctx) {
            stream.commit(trial);
            return Some(TokenRuleMatch::new(
                m.start_index,
                m.end_index,
                m.matched_tokens,
                self.describe(),
            ));
        }
        if !stream.has_more_tokens() {
            return None;
        }
        let at = stream.current_index();
        Some(TokenRuleMatch::new(at, at, vec![], self.describe()))
    }

    fn describe(&self) -> String {
        format!("optional({})", self.inner.describe())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn optional(inner: RuleRef) -> RuleRef {
    Rc::new(OptionalRule { inner })
}

/// Greedily repeats `inner` between `min` and `max` (inclusive) times.
///
/// Stops as soon as two consecutive repetitions both match empty, even if
/// `min` hasn't been reached yet — `spec.md` §4.3's engine-termination
/// guarantee otherwise admits an infinite repeat of a zero-width rule.
#[derive(Debug)]
pub struct RepeatRule {
    inner: RuleRef,
    min: usize,
    max: Option<usize>,
}

impl TokenRule for RepeatRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let mut trial = stream.fork();
        let start = trial.current_index();
        let mut matched: SmallVec<[Token; 4]> = SmallVec::new();
        let mut count = 0usize;
        let mut previous_was_empty = false;

        while self.max.map_or(true, |max| count < max) {
            let mut attempt = trial.fork();
            let Some(m) = self.inner.try_match(&mut attempt, ctx) else {
                break;
            };
            let is_empty = m.is_empty();
            if is_empty && previous_was_empty {
                break;
            }
            trial.commit(attempt);
            matched.extend(m.matched_tokens);
            count += 1;
            previous_was_empty = is_empty;
        }

        if count < self.min {
            return None;
        }
        let end = trial.current_index();
        stream.commit(trial);
        Some(TokenRuleMatch::new(
            start,
            end,
            matched.into_vec(),
            self.describe(),
        ))
    }

    fn describe(&self) -> String {
        match self.max {
            Some(max) => format!("repeat({}..={})", self.min, max),
            None => format!("repeat({}..)", self.min),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Repeats `inner` `min..=max` times (`max = None` for unbounded), greedily.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if `max` is `Some` and less than `min`.
pub fn repeat(inner: RuleRef, min: usize, max: Option<usize>) -> Result<RuleRef, EngineError> {
    if let Some(max) = max {
        if max < min {
            return Err(EngineError::InvalidArgument(format!(
                "repeat max ({max}) must be >= min ({min})"
            )));
        }
    }
    Ok(Rc::new(RepeatRule { inner, min, max }))
}

/// Matches `start`, then `content` repeatedly until `end` matches at the
/// current position (checked without consuming), then matches `end` for
/// real. Fails if `start` or the final `end` match fails, or if `content`
/// ever fails before `end` comes up — there's no silent early exit.
#[derive(Debug)]
pub struct BoundaryRule {
    start: RuleRef,
    content: RuleRef,
    end: RuleRef,
}

impl TokenRule for BoundaryRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let mut trial = stream.fork();
        let span_start = trial.current_index();
        let mut matched: SmallVec<[Token; 4]> = SmallVec::new();

        let opening = self.start.try_match(&mut trial, ctx)?;
        matched.extend(opening.matched_tokens);

        loop {
            let mut probe = trial.fork();
            if self.end.try_match(&mut probe, ctx).is_some() {
                break;
            }
            let mut attempt = trial.fork();
            let m = self.content.try_match(&mut attempt, ctx)?;
            if m.is_empty() {
                // A zero-width content rule can't make progress toward
                // `end`; stop looping rather than spin forever.
                break;
            }
            trial.commit(attempt);
            matched.extend(m.matched_tokens);
        }

        let closing = self.end.try_match(&mut trial, ctx)?;
        matched.extend(closing.matched_tokens);

        let span_end = trial.current_index();
        stream.commit(trial);
        Some(TokenRuleMatch::new(
            span_start,
            span_end,
            matched.into_vec(),
            self.describe(),
        ))
    }

    fn describe(&self) -> String {
        format!(
            "boundary({}, {}, {})",
            self.start.describe(),
            self.content.describe(),
            self.end.describe()
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches `start`, loops `content` until `end` comes up (checked, not
/// consumed, each iteration), then matches `end` itself.
#[must_use]
pub fn boundary(start: RuleRef, content: RuleRef, end: RuleRef) -> RuleRef {
    Rc::new(BoundaryRule { start, content, end })
}

/// Zero-width assertion: succeeds iff `inner` matches (or, for
/// [`Polarity::Negative`], fails to match) a throwaway view of the stream,
/// without ever moving the caller's cursor.
#[derive(Debug)]
pub struct LookaroundRule {
    inner: RuleRef,
    polarity: Polarity,
    behind: bool,
}

impl TokenRule for LookaroundRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let mut view = if self.behind {
            stream.create_lookbehind_stream()
        } else {
            stream.create_lookahead_stream()
        };
        let found = self.inner.try_match(&mut view, ctx).is_some();
        let succeeds = match self.polarity {
            Polarity::Positive => found,
            Polarity::Negative => !found,
        };
        if !succeeds {
            return None;
        }
        let at = stream.current_index();
        Some(TokenRuleMatch::new(at, at, vec![], self.describe()))
    }

    fn describe(&self) -> String {
        let dir = if self.behind { "behind" } else { "ahead" };
        let pol = match self.polarity {
            Polarity::Positive => "+",
            Polarity::Negative => "!",
        };
        format!("look{dir}({pol}{})", self.inner.describe())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn lookahead(inner: RuleRef, polarity: Polarity) -> RuleRef {
    Rc::new(LookaroundRule {
        inner,
        polarity,
        behind: false,
    })
}

#[must_use]
pub fn lookbehind(inner: RuleRef, polarity: Polarity) -> RuleRef {
    Rc::new(LookaroundRule {
        inner,
        polarity,
        behind: true,
    })
}

/// On success of `inner`, stores the matched tokens in the context under
/// `key` (in addition to returning them normally), for later replay by
/// [`ReferenceRule`] with [`ReferenceKind::Tokens`].
#[derive(Debug)]
pub struct CaptureRule {
    key: String,
    inner: RuleRef,
}

impl TokenRule for CaptureRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let m = self.inner.try_match(stream, ctx)?;
        ctx.capture_tokens(self.key.clone(), m.matched_tokens.clone());
        Some(TokenRuleMatch::new(
            m.start_index,
            m.end_index,
            m.matched_tokens,
            self.describe(),
        ))
    }

    fn describe(&self) -> String {
        format!("capture({:?}, {})", self.key, self.inner.describe())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn capture(key: impl Into<String>, inner: RuleRef) -> RuleRef {
    Rc::new(CaptureRule {
        key: key.into(),
        inner,
    })
}

/// Resolves `key` against the context at match time: as a named rule, a
/// replayed capture (value-equality atoms chained by [`SequenceRule`]), or
/// whichever of the two is bound, per `kind`.
#[derive(Debug)]
pub struct ReferenceRule {
    key: String,
    kind: ReferenceKind,
}

impl TokenRule for ReferenceRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let as_rule = ctx.get_rule_reference(&self.key);
        let as_tokens = ctx.get_captured_tokens(&self.key).cloned();

        let resolved: RuleRef = match self.kind {
            ReferenceKind::Rule => as_rule?,
            ReferenceKind::Tokens => tokens_to_rule(&as_tokens?),
            ReferenceKind::Dynamic => match (as_rule, as_tokens) {
                (Some(rule), None) => rule,
                (None, Some(tokens)) => tokens_to_rule(&tokens),
                _ => return None,
            },
        };

        let m = resolved.try_match(stream, ctx)?;
        Some(TokenRuleMatch::new(
            m.start_index,
            m.end_index,
            m.matched_tokens,
            self.describe(),
        ))
    }

    fn describe(&self) -> String {
        format!("reference({:?}, {:?})", self.key, self.kind)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds a rule that matches the exact token values in `tokens`, in order,
/// for [`ReferenceKind::Tokens`] replay. An empty capture replays as a rule
/// that always matches empty — replaying nothing should succeed trivially,
/// not fail — even at end of stream, so this can't reuse `optional`, which
/// now fails past the last token.
fn tokens_to_rule(tokens: &[Token]) -> RuleRef {
    if tokens.is_empty() {
        return lookahead(super::atoms::always_match(), Polarity::Positive);
    }
    let members: Vec<RuleRef> = tokens
        .iter()
        .map(|t| super::atoms::value(t.value()))
        .collect();
    Rc::new(SequenceRule { members })
}

#[must_use]
pub fn reference(key: impl Into<String>, kind: ReferenceKind) -> RuleRef {
    Rc::new(ReferenceRule {
        key: key.into(),
        kind,
    })
}

/// A forwarding rule that defers to whatever [`LazyRef::bind`] later sets,
/// used to "tie the knot" for [`recursive`]: the content factory closure
/// receives a `LazyRef` standing in for the rule under construction, and
/// binds it to the finished rule once built.
#[derive(Clone)]
pub struct LazyRef {
    target: Rc<RefCell<Option<RuleRef>>>,
}

impl LazyRef {
    fn new() -> Self {
        Self {
            target: Rc::new(RefCell::new(None)),
        }
    }

    fn bind(&self, rule: RuleRef) {
        *self.target.borrow_mut() = Some(rule);
    }

    fn as_rule_ref(&self) -> RuleRef {
        Rc::new(self.clone())
    }
}

impl fmt::Debug for LazyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LazyRef(bound={})", self.target.borrow().is_some())
    }
}

impl TokenRule for LazyRef {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let target = self.target.borrow().clone()?;
        target.try_match(stream, ctx)
    }

    fn describe(&self) -> String {
        "recursive_self".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches `opening`, then the content produced by applying `build_content`
/// to a self-reference, then `closing` — in that order, each exactly once.
/// Nesting comes from `build_content` invoking the self-reference, not from
/// any internal loop here: `recursive(open, close, |s| any_of(vec![s, atom]))`
/// over `((x))` descends once per open/close pair the content rule chooses
/// to consume.
#[derive(Debug)]
pub struct RecursiveRule {
    opening: RuleRef,
    content: RuleRef,
    closing: RuleRef,
}

impl TokenRule for RecursiveRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let mut trial = stream.fork();
        let start = trial.current_index();
        let mut matched: SmallVec<[Token; 4]> = SmallVec::new();

        let open = self.opening.try_match(&mut trial, ctx)?;
        matched.extend(open.matched_tokens);

        let content = self.content.try_match(&mut trial, ctx)?;
        matched.extend(content.matched_tokens);

        let close = self.closing.try_match(&mut trial, ctx)?;
        matched.extend(close.matched_tokens);

        let end = trial.current_index();
        stream.commit(trial);
        Some(TokenRuleMatch::new(
            start,
            end,
            matched.into_vec(),
            self.describe(),
        ))
    }

    fn describe(&self) -> String {
        "recursive".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds a self-referential rule: `opening`, then `build_content(self)`,
/// then `closing`. `build_content` receives a [`RuleRef`] standing in for
/// the finished `recursive` rule, so it can embed recursive occurrences of
/// itself (typically via [`super::atoms::always_match`]-free `any_of`
/// combinations with a base-case atom).
pub fn recursive(
    opening: RuleRef,
    closing: RuleRef,
    build_content: impl FnOnce(RuleRef) -> RuleRef,
) -> RuleRef {
    let lazy = LazyRef::new();
    let content = build_content(lazy.as_rule_ref());
    let built: RuleRef = Rc::new(RecursiveRule {
        opening,
        content,
        closing,
    });
    lazy.bind(built.clone());
    built
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::atoms::{always_match, never_match, value};
    use crate::token::Token;

    fn stream_of(values: &[&str]) -> TokenStream {
        TokenStream::new(
            values
                .iter()
                .map(|v| Token::unpositioned(*v).unwrap())
                .collect(),
        )
    }

    #[test]
    fn not_rule_consumes_one_token_on_non_match() {
        let mut ctx = TokenRuleContext::empty();
        let rule = value("a").not();
        let mut stream = stream_of(&["b"]);
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        assert_eq!(m.matched_tokens[0].value(), "b");

        let mut stream2 = stream_of(&["a"]);
        assert!(rule.try_match(&mut stream2, &mut ctx).is_none());
    }

    #[test]
    fn group_rule_collapses_matched_tokens() {
        let mut ctx = TokenRuleContext::empty();
        let rule = sequence(vec![value("a"), value("b")]).unwrap().group();
        let mut stream = stream_of(&["a", "b"]);
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        assert_eq!(m.matched_tokens.len(), 1);
        assert_eq!(m.matched_tokens[0].value(), "ab");
    }

    #[test]
    fn sequence_fails_and_resets_on_partial_match() {
        let mut ctx = TokenRuleContext::empty();
        let rule = sequence(vec![value("a"), value("b")]).unwrap();
        let mut stream = stream_of(&["a", "c"]);
        assert!(rule.try_match(&mut stream, &mut ctx).is_none());
        assert_eq!(stream.current_index(), 0);
    }

    #[test]
    fn any_of_tries_alternatives_in_order() {
        let mut ctx = TokenRuleContext::empty();
        let rule = any_of(vec![value("a"), value("b")]).unwrap();
        let mut stream = stream_of(&["b"]);
        assert!(rule.try_match(&mut stream, &mut ctx).is_some());
    }

    #[test]
    fn optional_matches_empty_when_a_token_remains() {
        let mut ctx = TokenRuleContext::empty();
        let rule = optional(value("a"));
        let mut stream = stream_of(&["z"]);
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn optional_fails_past_end_of_stream() {
        let mut ctx = TokenRuleContext::empty();
        let rule = sequence(vec![value("a"), optional(value("b"))]).unwrap();
        let mut stream = stream_of(&["a"]);
        assert!(rule.try_match(&mut stream, &mut ctx).is_none());
    }

    #[test]
    fn repeat_respects_min_and_max() {
        let mut ctx = TokenRuleContext::empty();
        let rule = repeat(value("a"), 2, Some(3)).unwrap();
        let mut stream = stream_of(&["a", "a", "a", "a"]);
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        assert_eq!(m.matched_tokens.len(), 3);

        let mut too_few = stream_of(&["a"]);
        assert!(rule.try_match(&mut too_few, &mut ctx).is_none());
    }

    #[test]
    fn repeat_stops_on_double_empty_match() {
        let mut ctx = TokenRuleContext::empty();
        let rule = repeat(optional(value("nope")), 0, None).unwrap();
        let mut stream = stream_of(&["x"]);
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        assert!(m.is_empty());
        assert_eq!(stream.current_index(), 0);
    }

    #[test]
    fn boundary_collects_content_then_consumes_end() {
        let mut ctx = TokenRuleContext::empty();
        let rule = boundary(value("a"), always_match(), value(";"));
        let mut stream = stream_of(&["a", "b", "c", ";", "d"]);
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        assert_eq!(m.matched_tokens.len(), 4);
        assert_eq!(stream.current_index(), 4);
    }

    #[test]
    fn boundary_with_zero_width_end_consumes_to_document_end() {
        let mut ctx = TokenRuleContext::empty();
        let rule = boundary(
            value("a"),
            always_match(),
            super::super::atoms::end_anchor(crate::rule::AnchorScope::Document),
        );
        let mut stream = stream_of(&["a", "b", "c"]);
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        assert_eq!(m.matched_tokens.len(), 3);
        assert!(!stream.has_more_tokens());
    }

    #[test]
    fn boundary_fails_when_start_does_not_match() {
        let mut ctx = TokenRuleContext::empty();
        let rule = boundary(value("x"), always_match(), value(";"));
        let mut stream = stream_of(&["a", "b", ";"]);
        assert!(rule.try_match(&mut stream, &mut ctx).is_none());
    }

    #[test]
    fn boundary_fails_when_end_never_comes() {
        let mut ctx = TokenRuleContext::empty();
        let rule = boundary(value("a"), always_match(), value(";"));
        let mut stream = stream_of(&["a", "b", "c"]);
        assert!(rule.try_match(&mut stream, &mut ctx).is_none());
    }

    #[test]
    fn lookahead_does_not_consume() {
        let mut ctx = TokenRuleContext::empty();
        let rule = lookahead(value("b"), Polarity::Positive);
        let mut stream = stream_of(&["b", "c"]);
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        assert!(m.is_empty());
        assert_eq!(stream.current_index(), 0);
    }

    #[test]
    fn negative_lookahead_succeeds_when_inner_fails() {
        let mut ctx = TokenRuleContext::empty();
        let rule = lookahead(value("x"), Polarity::Negative);
        let mut stream = stream_of(&["b"]);
        assert!(rule.try_match(&mut stream, &mut ctx).is_some());
    }

    #[test]
    fn lookbehind_sees_already_consumed_tokens() {
        let mut ctx = TokenRuleContext::empty();
        let mut stream = stream_of(&["a", "b"]);
        let _ = stream.read_token().unwrap();
        let rule = lookbehind(value("a"), Polarity::Positive);
        assert!(rule.try_match(&mut stream, &mut ctx).is_some());
    }

    #[test]
    fn capture_then_tokens_reference_replays_values() {
        let mut ctx = TokenRuleContext::empty();
        let cap = capture("tag", value("div"));
        let mut stream = stream_of(&["div", "div"]);
        assert!(cap.try_match(&mut stream, &mut ctx).is_some());

        let back = reference("tag", ReferenceKind::Tokens);
        assert!(back.try_match(&mut stream, &mut ctx).is_some());
    }

    #[test]
    fn empty_capture_replays_as_trivial_empty_match_even_at_end_of_stream() {
        let mut ctx = TokenRuleContext::empty();
        ctx.capture_tokens("empty", vec![]);
        let mut stream = stream_of(&["x"]);
        let _ = stream.read_token().unwrap();
        assert!(!stream.has_more_tokens());

        let back = reference("empty", ReferenceKind::Tokens);
        let m = back.try_match(&mut stream, &mut ctx).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn rule_reference_delegates_to_context() {
        let mut ctx = TokenRuleContext::empty();
        ctx.define_rule("digit", value("1"));
        let rule = reference("digit", ReferenceKind::Rule);
        let mut stream = stream_of(&["1"]);
        assert!(rule.try_match(&mut stream, &mut ctx).is_some());
    }

    #[test]
    fn unresolved_reference_fails_quietly() {
        let mut ctx = TokenRuleContext::empty();
        let rule = reference("missing", ReferenceKind::Dynamic);
        let mut stream = stream_of(&["1"]);
        assert!(rule.try_match(&mut stream, &mut ctx).is_none());
    }

    #[test]
    fn recursive_matches_balanced_brackets() {
        let mut ctx = TokenRuleContext::empty();
        let balanced = recursive(value("("), value(")"), |self_ref| {
            any_of(vec![self_ref, value("x")]).unwrap()
        });
        let mut stream = stream_of(&["(", "(", "x", ")", ")"]);
        let m = balanced.try_match(&mut stream, &mut ctx).unwrap();
        assert_eq!(m.matched_tokens.len(), 5);
        assert!(!stream.has_more_tokens());
    }

    #[test]
    fn recursive_base_case_is_plain_atom() {
        let mut ctx = TokenRuleContext::empty();
        let balanced = recursive(value("("), value(")"), |self_ref| {
            any_of(vec![self_ref, never_match()]).unwrap()
        });
        let mut stream = stream_of(&["(", ")"]);
        assert!(balanced.try_match(&mut stream, &mut ctx).is_none());
    }
}
