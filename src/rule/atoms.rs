//! Atomic rules: `value`, `pattern`, `always`, `never`, and the two anchors.

use super::{AnchorScope, RuleRef, TokenRule, TokenRuleMatch};
use crate::context::TokenRuleContext;
use crate::error::{EngineError, EngineResult};
use crate::stream::TokenStream;
use regex::Regex;
use std::any::Any;
use std::rc::Rc;

/// Matches a single non-shadow token whose value equals a fixed literal.
#[derive(Debug)]
pub struct ValueRule {
    literal: String,
    case_insensitive: bool,
}

impl TokenRule for ValueRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        _ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let mut trial = stream.fork();
        let start = trial.current_index();
        let token = trial.read_token().ok()?;
        let matches = if self.case_insensitive {
            token.value().eq_ignore_ascii_case(&self.literal)
        } else {
            token.value() == self.literal
        };
        if !matches {
            return None;
        }
        let end = trial.current_index();
        stream.commit(trial);
        Some(TokenRuleMatch::new(start, end, vec![token], self.describe()))
    }

    fn describe(&self) -> String {
        if self.case_insensitive {
            format!("value({:?}, ci)", self.literal)
        } else {
            format!("value({:?})", self.literal)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A fixed-string atom. Case-sensitive.
#[must_use]
pub fn value(literal: impl Into<String>) -> RuleRef {
    Rc::new(ValueRule {
        literal: literal.into(),
        case_insensitive: false,
    })
}

/// A fixed-string atom, ignoring ASCII case.
#[must_use]
pub fn value_ci(literal: impl Into<String>) -> RuleRef {
    Rc::new(ValueRule {
        literal: literal.into(),
        case_insensitive: true,
    })
}

/// Matches a single non-shadow token whose whole value matches a regex.
#[derive(Debug)]
pub struct PatternRule {
    regex: Regex,
    source: String,
}

impl TokenRule for PatternRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        _ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let mut trial = stream.fork();
        let start = trial.current_index();
        let token = trial.read_token().ok()?;
        if !self.regex.is_match(&token.value()) {
            return None;
        }
        let end = trial.current_index();
        stream.commit(trial);
        Some(TokenRuleMatch::new(start, end, vec![token], self.describe()))
    }

    fn describe(&self) -> String {
        format!("pattern(/{}/)", self.source)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A regex atom with whole-match semantics. Compilation errors are
/// construction-time failures, never runtime `NoMatch`es.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if `pattern` doesn't compile.
pub fn pattern(source: impl Into<String>) -> EngineResult<RuleRef> {
    let source = source.into();
    let anchored = format!("^(?:{source})$");
    let regex = Regex::new(&anchored)
        .map_err(|err| EngineError::InvalidArgument(format!("invalid regex `{source}`: {err}")))?;
    Ok(Rc::new(PatternRule { regex, source }))
}

/// Consumes one non-shadow token; matches empty at end of stream.
#[derive(Debug)]
pub struct AlwaysMatchRule;

impl TokenRule for AlwaysMatchRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        _ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
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
        "always".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn always_match() -> RuleRef {
    Rc::new(AlwaysMatchRule)
}

/// Never matches.
#[derive(Debug)]
pub struct NeverMatchRule;

impl TokenRule for NeverMatchRule {
    fn try_match(
        &self,
        _stream: &mut TokenStream,
        _ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        None
    }

    fn describe(&self) -> String {
        "never".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn never_match() -> RuleRef {
    Rc::new(NeverMatchRule)
}

/// Empty, non-consuming match at a document or line boundary.
#[derive(Debug)]
pub struct StartAnchorRule {
    scope: AnchorScope,
}

impl TokenRule for StartAnchorRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        _ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let at_start = match self.scope {
            AnchorScope::Document => stream.current_index() == 0,
            AnchorScope::Line => {
                stream.current_index() == 0
                    || match stream.previous_non_shadow() {
                        None => true,
                        Some(prev) => {
                            prev.value().contains('\n')
                                || match (prev.line(), stream.current_token().ok().and_then(|t| t.line()))
                                {
                                    (Some(prev_line), Some(cur_line)) => prev_line < cur_line,
                                    _ => false,
                                }
                        }
                    }
            }
        };
        if !at_start {
            return None;
        }
        let at = stream.current_index();
        Some(TokenRuleMatch::new(at, at, vec![], self.describe()))
    }

    fn describe(&self) -> String {
        format!("start({:?})", self.scope)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn start_anchor(scope: AnchorScope) -> RuleRef {
    Rc::new(StartAnchorRule { scope })
}

/// Empty, non-consuming match at a document or line boundary.
#[derive(Debug)]
pub struct EndAnchorRule {
    scope: AnchorScope,
}

impl TokenRule for EndAnchorRule {
    fn try_match(
        &self,
        stream: &mut TokenStream,
        _ctx: &mut TokenRuleContext,
    ) -> Option<TokenRuleMatch> {
        let at_end = match self.scope {
            AnchorScope::Document => !stream.has_more_tokens(),
            AnchorScope::Line => {
                !stream.has_more_tokens()
                    || match stream.current_token() {
                        Err(_) => true,
                        Ok(current) => {
                            current.value().contains('\n')
                                || match (current.line(), stream.next_non_shadow().and_then(crate::token::Token::line))
                                {
                                    (Some(cur_line), Some(next_line)) => cur_line < next_line,
                                    _ => false,
                                }
                        }
                    }
            }
        };
        if !at_end {
            return None;
        }
        let at = stream.current_index();
        Some(TokenRuleMatch::new(at, at, vec![], self.describe()))
    }

    fn describe(&self) -> String {
        format!("end({:?})", self.scope)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[must_use]
pub fn end_anchor(scope: AnchorScope) -> RuleRef {
    Rc::new(EndAnchorRule { scope })
}
