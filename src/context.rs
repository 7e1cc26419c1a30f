//! [`TokenRuleContext`]: named rule references and named captured-token lists.

use crate::rule::RuleRef;
use crate::token::Token;
use std::collections::HashMap;
use std::fmt;

/// Keyed store threaded through a single engine run.
///
/// Last-write-wins on both maps; captured token lists are stored by value
/// so a caller mutating their own copy afterward can't affect what's
/// stored here.
#[derive(Default, Clone)]
pub struct TokenRuleContext {
    defined_rules: HashMap<String, RuleRef>,
    captured_tokens: HashMap<String, Vec<Token>>,
}

impl fmt::Debug for TokenRuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRuleContext")
            .field("defined_rules", &self.defined_rules.keys().collect::<Vec<_>>())
            .field("captured_tokens", &self.captured_tokens)
            .finish()
    }
}

impl TokenRuleContext {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Defines (or overwrites) a named rule reference.
    pub fn define_rule(&mut self, key: impl Into<String>, rule: RuleRef) {
        self.defined_rules.insert(key.into(), rule);
    }

    #[must_use]
    pub fn get_rule_reference(&self, key: &str) -> Option<RuleRef> {
        self.defined_rules.get(key).cloned()
    }

    /// Stores a defensive copy of `tokens` under `key`, overwriting any
    /// prior capture.
    pub fn capture_tokens(&mut self, key: impl Into<String>, tokens: Vec<Token>) {
        self.captured_tokens.insert(key.into(), tokens);
    }

    #[must_use]
    pub fn get_captured_tokens(&self, key: &str) -> Option<&Vec<Token>> {
        self.captured_tokens.get(key)
    }

    /// A context carrying the same defined rules but no captures, used to
    /// seed each fresh [`crate::grammar::Grammar::process`] run so that
    /// captures from one run never leak into the next.
    #[must_use]
    pub(crate) fn fork_for_run(&self) -> Self {
        Self {
            defined_rules: self.defined_rules.clone(),
            captured_tokens: HashMap::new(),
        }
    }
}
