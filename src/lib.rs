//! A composable, backtracking rule engine for rewriting token streams to a
//! fixed point.
//!
//! A [`grammar::Grammar`] is an ordered set of `(name, rule, action)`
//! entries. Its engine scans a token list left to right, tries each rule at
//! the cursor in declaration order, and on the first match splices the
//! matching rule's [`action::TokenAction`] output back into the list before
//! continuing — repeating until the cursor passes the end. Rules are built
//! from atoms ([`rule::atoms`]) and combinators ([`rule::combinators`]);
//! both are plain [`rule::RuleRef`] values and compose freely.
//!
//! ```
//! use tokenrule::action::{grouping, GroupingMode};
//! use tokenrule::grammar::GrammarBuilder;
//! use tokenrule::rule::atoms::value;
//! use tokenrule::token::Token;
//!
//! let mut builder = GrammarBuilder::new();
//! builder
//!     .define("greeting", value("hi"), grouping(GroupingMode::Matched))
//!     .unwrap();
//! let grammar = builder.build();
//!
//! let tokens = vec![Token::unpositioned("hi").unwrap()];
//! let out = grammar.process(tokens);
//! assert_eq!(out.len(), 1);
//! ```

pub mod action;
pub mod context;
pub mod error;
pub mod grammar;
pub mod rule;
pub mod stream;
pub mod token;

pub use context::TokenRuleContext;
pub use error::{EngineError, EngineResult};
pub use grammar::{EngineConfig, Grammar, GrammarBuilder};
pub use rule::{RuleExt, RuleRef, TokenRule, TokenRuleMatch};
pub use stream::TokenStream;
pub use token::{Position, Token};
