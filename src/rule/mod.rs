//! Token rules: matchers over a [`TokenStream`] plus [`TokenRuleContext`].
//!
//! Every rule is an `Rc<dyn TokenRule>` ([`RuleRef`]) so grammars,
//! combinators, and [`TokenRuleContext`] rule references can all share the
//! same immutable rule tree without cloning it. Matching follows one
//! protocol everywhere: fork the stream passed in, attempt the match on the
//! fork, and on success copy the fork's cursor back — on failure the
//! caller's stream is untouched. See [`crate::stream::TokenStream::fork`].

pub mod atoms;
pub mod combinators;

use crate::context::TokenRuleContext;
use crate::stream::TokenStream;
use crate::token::Token;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Span, consumed tokens, and a diagnostic tag for a successful match.
///
/// `matching_rule` is a [`TokenRule::describe`] string rather than the rule
/// object itself — per `spec.md` §4.3, rule identity is only needed for
/// diagnostics and test equality, and a `String` gets `Clone`/`PartialEq`
/// for free instead of requiring trait-object equality.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRuleMatch {
    pub start_index: usize,
    pub end_index: usize,
    pub matched_tokens: Vec<Token>,
    pub matching_rule: String,
}

impl TokenRuleMatch {
    #[must_use]
    pub fn new(
        start_index: usize,
        end_index: usize,
        matched_tokens: Vec<Token>,
        matching_rule: impl Into<String>,
    ) -> Self {
        debug_assert!(start_index <= end_index);
        debug_assert!(start_index < end_index || matched_tokens.is_empty());
        Self {
            start_index,
            end_index,
            matched_tokens,
            matching_rule: matching_rule.into(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index && self.matched_tokens.is_empty()
    }
}

/// A matcher over a token stream.
///
/// `try_match` attempts to consume tokens starting at `stream`'s current
/// index. On success it returns a match and leaves `stream` advanced to the
/// match's `end_index`; on failure it returns `None` and `stream` is
/// unchanged.
pub trait TokenRule: fmt::Debug {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch>;

    /// A short diagnostic label, e.g. `"value(\"fn\")"` or `"sequence(3)"`.
    /// Used in [`TokenRuleMatch::matching_rule`] and in
    /// [`crate::grammar::GrammarBuilder`]'s duplicate-name error.
    fn describe(&self) -> String;

    /// Enables the structural downcasts `GrammarBuilder` needs to detect
    /// "already `any(rule, rule.group())`" shapes before rewriting a rule
    /// for a `Grouping` action (`spec.md` §4.6).
    fn as_any(&self) -> &dyn Any;
}

/// A shared, immutable rule. Rules form a tree (or, via [`combinators::recursive`],
/// a cycle) referenced from grammars, contexts, and other combinators.
pub type RuleRef = Rc<dyn TokenRule>;

/// `not()`/`group()`, exposed as an extension trait on [`RuleRef`] rather
/// than default methods on [`TokenRule`] since both need an owned `Rc` of
/// the receiver to build their wrapper rule.
pub trait RuleExt {
    /// A rule that matches exactly when `self` does not, at the same
    /// position, consuming one non-shadow token on success (or matching
    /// empty at end of stream).
    #[must_use]
    fn not(&self) -> RuleRef;

    /// A rule that, on success of `self`, replaces the matched tokens with
    /// a single [`Token::Group`] spanning them.
    #[must_use]
    fn group(&self) -> RuleRef;
}

impl RuleExt for RuleRef {
    fn not(&self) -> RuleRef {
        Rc::new(combinators::NotRule {
            inner: self.clone(),
        })
    }

    fn group(&self) -> RuleRef {
        Rc::new(combinators::GroupRule {
            inner: self.clone(),
        })
    }
}

/// Which document-relative edge an anchor checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorScope {
    Document,
    Line,
}

/// Whether a [`combinators::LookaroundRule`] requires its inner rule to
/// match or to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

/// How [`combinators::ReferenceRule`] resolves a context key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Delegate to the named rule in [`TokenRuleContext`].
    Rule,
    /// Replay the named captured token list as a sequence of value-equality atoms.
    Tokens,
    /// Behave as `Rule` or `Tokens`, whichever is bound; fail if both or neither are.
    Dynamic,
}
