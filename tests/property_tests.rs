//! Law checks for `spec.md` §8 "Testable Properties", gated behind the
//! `testing` feature so the ordinary test run stays example-driven.
#![cfg(feature = "testing")]

use proptest::prelude::*;
use tokenrule::action::{grouping, identity, GroupingMode};
use tokenrule::context::TokenRuleContext;
use tokenrule::grammar::GrammarBuilder;
use tokenrule::rule::atoms::{never_match, pattern, value};
use tokenrule::rule::combinators::{any_of, capture, optional, reference, sequence};
use tokenrule::rule::{ReferenceKind, RuleExt};
use tokenrule::stream::TokenStream;
use tokenrule::token::Token;

fn arb_word() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn arb_words(max_len: usize) -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(arb_word(), 0..max_len)
}

fn tokens_from(words: &[String]) -> Vec<Token> {
    words.iter().map(|w| Token::unpositioned(w.clone()).unwrap()).collect()
}

proptest! {
    /// For every rule and stream: a failed match leaves the cursor where it found it.
    #[test]
    fn prop_failed_match_does_not_move_cursor(words in arb_words(8)) {
        let rule = value("never-matches-this-exact-string");
        let tokens = tokens_from(&words);
        let mut stream = TokenStream::new(tokens);
        let mut ctx = TokenRuleContext::empty();
        let before = stream.current_index();
        let outcome = rule.try_match(&mut stream, &mut ctx);
        prop_assert!(outcome.is_none());
        prop_assert_eq!(stream.current_index(), before);
    }

    /// not(r) succeeds exactly when r fails, at the same starting index,
    /// whenever at least one token remains.
    #[test]
    fn prop_not_is_exclusive_or_with_inner(word in arb_word(), other in arb_word()) {
        let rule = value(word.clone());
        let tokens = vec![Token::unpositioned(other.clone()).unwrap()];
        let mut direct_stream = TokenStream::new(tokens.clone());
        let mut ctx = TokenRuleContext::empty();
        let direct = rule.clone().try_match(&mut direct_stream, &mut ctx).is_some();

        let not_rule = rule.not();
        let mut not_stream = TokenStream::new(tokens);
        let mut ctx2 = TokenRuleContext::empty();
        let negated = not_rule.try_match(&mut not_stream, &mut ctx2).is_some();

        prop_assert_ne!(direct, negated);
    }

    /// any-of picks the first alternative that matches, in declaration order.
    #[test]
    fn prop_any_of_prefers_earliest_match(word in arb_word()) {
        let first = value(word.clone());
        let second = value(word.clone());
        let combined = any_of(vec![first.clone(), second]).unwrap();

        let tokens = vec![Token::unpositioned(word).unwrap()];
        let mut stream_a = TokenStream::new(tokens.clone());
        let mut ctx_a = TokenRuleContext::empty();
        let direct = first.try_match(&mut stream_a, &mut ctx_a);

        let mut stream_b = TokenStream::new(tokens);
        let mut ctx_b = TokenRuleContext::empty();
        let via_any_of = combined.try_match(&mut stream_b, &mut ctx_b);

        prop_assert_eq!(direct.map(|m| m.matched_tokens), via_any_of.map(|m| m.matched_tokens));
    }

    /// sequence concatenates its sub-matches' token lists in order.
    #[test]
    fn prop_sequence_concatenates_submatches(a in arb_word(), b in arb_word()) {
        let rule = sequence(vec![value(a.clone()), value(b.clone())]).unwrap();
        let tokens = vec![Token::unpositioned(a.clone()).unwrap(), Token::unpositioned(b.clone()).unwrap()];
        let mut stream = TokenStream::new(tokens);
        let mut ctx = TokenRuleContext::empty();
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        let values: Vec<String> = m.matched_tokens.iter().map(Token::value).collect();
        prop_assert_eq!(values, vec![a, b]);
    }

    /// group(r) always produces exactly one Group token wrapping r's matched span.
    #[test]
    fn prop_group_yields_single_group_token(words in arb_words(4).prop_filter("need at least one word", |w| !w.is_empty())) {
        let word = words[0].clone();
        let rule = value(word.clone()).group();
        let tokens = vec![Token::unpositioned(word.clone()).unwrap()];
        let mut stream = TokenStream::new(tokens);
        let mut ctx = TokenRuleContext::empty();
        let m = rule.try_match(&mut stream, &mut ctx).unwrap();
        prop_assert_eq!(m.matched_tokens.len(), 1);
        match &m.matched_tokens[0] {
            Token::Group { children, .. } => {
                let values: Vec<String> = children.iter().map(Token::value).collect();
                prop_assert_eq!(values, vec![word]);
            }
            other => prop_assert!(false, "expected a Group token, got {other:?}"),
        }
    }

    /// An identity-action-only grammar is a no-op on any token list.
    #[test]
    fn prop_identity_grammar_round_trips(words in arb_words(12)) {
        let mut builder = GrammarBuilder::new();
        builder.define_identity("any", tokenrule::rule::atoms::always_match()).unwrap();
        let grammar = builder.build();
        let tokens = tokens_from(&words);
        let out = grammar.process(tokens.clone());
        prop_assert_eq!(out, tokens);
    }

    /// The engine always terminates, even for a rule that matches empty.
    #[test]
    fn prop_engine_terminates_on_empty_matching_rules(words in arb_words(20)) {
        let mut builder = GrammarBuilder::new();
        builder.define("optional_never", optional(never_match()), identity()).unwrap();
        let grammar = builder.build();
        let tokens = tokens_from(&words);
        let out = grammar.process(tokens.clone());
        prop_assert_eq!(out.len(), tokens.len());
    }

    /// Wrapping every other token in a Shadow token does not change a
    /// non-anchor rule's matches against the non-shadow tokens.
    #[test]
    fn prop_shadow_insertion_does_not_change_matches(a in arb_word(), b in arb_word()) {
        let rule = sequence(vec![value(a.clone()), value(b.clone())]).unwrap();

        let plain = vec![Token::unpositioned(a.clone()).unwrap(), Token::unpositioned(b.clone()).unwrap()];
        let mut stream_plain = TokenStream::new(plain);
        let mut ctx_plain = TokenRuleContext::empty();
        let plain_result = rule.clone().try_match(&mut stream_plain, &mut ctx_plain);

        let shadowed = vec![
            Token::unpositioned(a.clone()).unwrap(),
            Token::shadow(Token::unpositioned(" ").unwrap()),
            Token::unpositioned(b.clone()).unwrap(),
        ];
        let mut stream_shadowed = TokenStream::new(shadowed);
        let mut ctx_shadowed = TokenRuleContext::empty();
        let shadowed_result = rule.try_match(&mut stream_shadowed, &mut ctx_shadowed);

        prop_assert_eq!(
            plain_result.map(|m| m.matched_tokens.iter().map(Token::value).collect::<Vec<_>>()),
            shadowed_result.map(|m| m.matched_tokens.iter().map(Token::value).collect::<Vec<_>>())
        );
    }

    /// A reference("k", TOKENS) matches exactly when the following tokens'
    /// values equal, in order, the captured tokens' values.
    #[test]
    fn prop_reference_tokens_replay_matches_by_value(tag in "[a-z]{1,5}") {
        let rule = sequence(vec![
            capture("tag", pattern("[a-z]+").unwrap()),
            value("="),
            reference("tag", ReferenceKind::Tokens),
        ])
        .unwrap();

        let matching = vec![
            Token::unpositioned(tag.clone()).unwrap(),
            Token::unpositioned("=").unwrap(),
            Token::unpositioned(tag.clone()).unwrap(),
        ];
        let mut stream = TokenStream::new(matching);
        let mut ctx = TokenRuleContext::empty();
        prop_assert!(rule.clone().try_match(&mut stream, &mut ctx).is_some());

        let mut builder = GrammarBuilder::new();
        builder.define("backref", rule, grouping(GroupingMode::Matched)).unwrap();
        let grammar = builder.build();
        let out = grammar.process(vec![
            Token::unpositioned(tag.clone()).unwrap(),
            Token::unpositioned("=").unwrap(),
            Token::unpositioned(format!("{tag}x")).unwrap(),
        ]);
        let no_groups = out.iter().all(|t| !matches!(t, Token::Group { .. }));
        prop_assert!(no_groups);
    }
}
