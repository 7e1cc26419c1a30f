//! [`Grammar`]: an ordered `(name, rule, action)` set plus the engine loop
//! that rewrites a token list by iteratively applying it to a fixed point.

use crate::action::{grouping, ActionRef, GroupingMode};
use crate::context::TokenRuleContext;
use crate::error::{EngineError, EngineResult};
use crate::rule::{RuleExt, RuleRef};
use crate::stream::TokenStream;
use crate::token::Token;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One `(name, rule, action)` entry in a grammar, in builder insertion order.
#[derive(Clone)]
struct GrammarEntry {
    name: String,
    rule: RuleRef,
    action: ActionRef,
}

/// Tunables for [`Grammar::process_with_config`].
///
/// `Grammar::process` delegates to it with `EngineConfig::default()`.
#[derive(Clone)]
pub struct EngineConfig {
    /// Upper bound on outer-loop iterations. Defaults to `usize::MAX`
    /// (effectively unbounded); the engine still terminates on its own via
    /// the forced `+1` advance, this is a belt-and-suspenders cap for
    /// pathological grammars in hosted/embedded settings.
    pub max_iterations: usize,
    /// How many outer-loop iterations pass between checks of a
    /// caller-supplied cancellation flag in
    /// [`Grammar::process_cancellable`].
    pub cancellation_poll_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: usize::MAX,
            cancellation_poll_interval: 256,
        }
    }
}

/// An immutable, buildable `(rule, action)` set produced by [`GrammarBuilder`].
#[derive(Clone)]
pub struct Grammar {
    entries: Vec<GrammarEntry>,
    context: TokenRuleContext,
}

impl Grammar {
    /// Rewrites `tokens` by repeatedly trying each entry in declaration
    /// order at the current cursor, applying the first one that matches,
    /// splicing its action's output back in, and repeating until the
    /// cursor passes the end. Equivalent to
    /// `self.process_with_config(tokens, &EngineConfig::default())`.
    #[must_use]
    pub fn process(&self, tokens: Vec<Token>) -> Vec<Token> {
        self.process_with_config(tokens, &EngineConfig::default())
    }

    /// As [`Grammar::process`], but bounded by `config.max_iterations`.
    #[must_use]
    pub fn process_with_config(&self, tokens: Vec<Token>, config: &EngineConfig) -> Vec<Token> {
        self.run(tokens, config, None)
    }

    /// As [`Grammar::process_with_config`], additionally polling
    /// `cancelled` every `config.cancellation_poll_interval` outer-loop
    /// iterations; if set, the engine stops early and returns the current
    /// `L` as built so far.
    #[must_use]
    pub fn process_cancellable(
        &self,
        tokens: Vec<Token>,
        config: &EngineConfig,
        cancelled: &Arc<AtomicBool>,
    ) -> Vec<Token> {
        self.run(tokens, config, Some(cancelled))
    }

    fn run(
        &self,
        tokens: Vec<Token>,
        config: &EngineConfig,
        cancelled: Option<&Arc<AtomicBool>>,
    ) -> Vec<Token> {
        let mut list = tokens;
        let mut ctx = self.context.fork_for_run();
        let mut index = 0usize;
        let mut iterations = 0usize;

        while index < list.len() {
            if iterations >= config.max_iterations {
                break;
            }
            if let Some(flag) = cancelled {
                if iterations % config.cancellation_poll_interval.max(1) == 0
                    && flag.load(Ordering::Relaxed)
                {
                    break;
                }
            }
            iterations += 1;

            let backing: std::rc::Rc<[Token]> = std::rc::Rc::from(list.clone());
            let stream = TokenStream::from_rc(backing, index);

            let mut applied = false;
            for entry in &self.entries {
                let mut trial = stream.clone();
                if let Some(m) = entry.rule.try_match(&mut trial, &mut ctx) {
                    tracing::trace!(rule = %entry.name, start = m.start_index, end = m.end_index, "rule matched");
                    let span = list[m.start_index..m.end_index].to_vec();
                    let produced = entry.action.apply(&m, &span, &mut ctx);
                    let produced_len = produced.len();
                    list.splice(m.start_index..m.end_index, produced);
                    index = m.start_index + produced_len.max(1);
                    applied = true;
                    break;
                }
            }
            if !applied {
                index += 1;
            }
        }

        tracing::debug!(iterations, final_len = list.len(), "grammar run complete");
        list
    }
}

/// Builds a [`Grammar`] out of named `(rule, action)` entries.
///
/// Names must be non-empty and unique; a `Grouping` action on a rule is
/// transparently rewritten to `any_of([rule, rule.group()])` so the same
/// entry matches both a raw span and its already-grouped form across
/// repeated passes, unless the supplied rule already has that exact shape.
#[derive(Default)]
pub struct GrammarBuilder {
    entries: Vec<GrammarEntry>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named rule with an explicit action.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] if `name` is empty, or
    /// [`EngineError::InvalidRule`] if `name` is already defined.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        rule: RuleRef,
        action: ActionRef,
    ) -> EngineResult<&mut Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(EngineError::InvalidArgument(
                "grammar rule name must not be empty".to_string(),
            ));
        }
        if self.entries.iter().any(|e| e.name == name) {
            return Err(EngineError::InvalidRule(format!(
                "duplicate grammar rule name `{name}`"
            )));
        }
        let rule = rewrite_for_grouping(rule, &action);
        tracing::trace!(name = %name, "defined grammar rule");
        self.entries.push(GrammarEntry { name, rule, action });
        Ok(self)
    }

    /// Adds a named rule with the identity action.
    ///
    /// # Errors
    ///
    /// See [`GrammarBuilder::define`].
    pub fn define_identity(&mut self, name: impl Into<String>, rule: RuleRef) -> EngineResult<&mut Self> {
        self.define(name, rule, crate::action::identity())
    }

    /// Snapshots the declared entries and a context seeded with every
    /// defined rule (so [`crate::rule::combinators::ReferenceRule`] entries
    /// can resolve each other by name).
    #[must_use]
    pub fn build(&self) -> Grammar {
        let mut context = TokenRuleContext::empty();
        for entry in &self.entries {
            context.define_rule(entry.name.clone(), entry.rule.clone());
        }
        Grammar {
            entries: self.entries.clone(),
            context,
        }
    }
}

/// Detects whether `rule` is already `any_of([x, x.group()])`-shaped: an
/// `AnyOf` of exactly two alternatives, exactly one of which is a
/// `GroupRule`. Avoids re-wrapping a rule the caller already prepared for
/// grouping, per `spec.md` §4.6.
fn rewrite_for_grouping(rule: RuleRef, action: &ActionRef) -> RuleRef {
    let is_grouping = action.as_any().downcast_ref::<crate::action::GroupingAction>().is_some();
    if !is_grouping || already_grouped_shape(rule.as_any()) {
        return rule;
    }
    crate::rule::combinators::any_of(vec![rule.clone(), rule.group()]).unwrap_or(rule)
}

fn already_grouped_shape(any: &dyn Any) -> bool {
    let Some(any_of) = any.downcast_ref::<crate::rule::combinators::AnyOfRule>() else {
        return false;
    };
    let alts = any_of.alternatives();
    alts.len() == 2
        && alts
            .iter()
            .filter(|alt| alt.as_any().downcast_ref::<crate::rule::combinators::GroupRule>().is_some())
            .count()
            == 1
}

/// Convenience for building a single-entry grouping grammar, used by
/// `spec.md` §8 scenarios 1 and 6.
#[must_use]
pub fn grouping_action(mode: GroupingMode) -> ActionRef {
    grouping(mode)
}
