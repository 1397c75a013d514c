//! Grammar statements: recursion, entry rules, knot-tying failures.

use rosie::ErrorCode;

use crate::{load_errors, match_tree, run};

#[test]
fn right_recursive_grammar() {
    // S = {"a" S} / ""  against "aaab": spans [0,3), leftover "b"
    let result = run("grammar\n  S = {\"a\" S} / \"\"\nend", "S", "aaab");
    assert!(result.matched());
    let tree = result.tree.unwrap();
    assert_eq!(tree.name, "S");
    assert_eq!((tree.start, tree.end), (0, 3));
    assert_eq!(result.leftover, 1);
}

#[test]
fn recursive_rule_nests_its_own_captures() {
    let tree = match_tree("grammar\n  S = {\"a\" S} / \"\"\nend", "S", "aa");
    // Each recursive entry produced a nested S node
    assert_eq!(tree.name, "S");
    assert_eq!(tree.subs.len(), 1);
    assert_eq!(tree.subs[0].name, "S");
    assert_eq!(tree.subs[0].subs.len(), 1);
}

#[test]
fn mutually_recursive_grammar() {
    let src = "grammar\n  A = {\"a\" B} / \"a\"\n  B = {\"b\" A}\nend";
    let result = run(src, "A", "ababa");
    assert!(result.matched());
    assert_eq!(result.leftover, 0);

    // Odd prefix: falls back to the bare "a" arm after one step
    let result = run(src, "A", "abab");
    assert!(result.matched());
    assert_eq!(result.leftover, 1);
}

#[test]
fn balanced_parens_grammar() {
    let src = "grammar\n  P = {\"(\" P* \")\"}\nend";
    assert!(run(src, "P", "(()(()))").matched());
    assert_eq!(run(src, "P", "(()(()))").leftover, 0);
    assert!(!run(src, "P", "(()").matched());
}

#[test]
fn grammar_with_private_rules() {
    let src = "grammar\n  alias digit = {[0-9]}\nin\n  num = {digit+}\nend";
    let tree = match_tree(src, "num", "123");
    assert_eq!(tree.name, "num");
    assert!(tree.subs.is_empty()); // digit is an alias rule
}

#[test]
fn left_recursion_is_a_grammar_error() {
    let diags = load_errors("grammar\n  S = {S \"a\"}\nend");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E105));
}

#[test]
fn indirect_left_recursion_is_caught() {
    let diags = load_errors("grammar\n  A = {B \"x\"}\n  B = {A \"y\"}\nend");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E105));
}

#[test]
fn undefined_rule_reference_in_grammar() {
    let diags = load_errors("grammar\n  S = {\"a\" T}\nend");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E100));
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E105));
}

#[test]
fn duplicate_rule_names_rejected() {
    let diags = load_errors("grammar\n  S = \"a\"\n  S = \"b\"\nend");
    assert!(diags.iter().any(|d| d.code() == ErrorCode::E105));
}

#[test]
fn grammar_rules_see_outer_bindings() {
    let src = "alias d = [0-9]\ngrammar\n  num = {d+}\nend";
    let result = run(src, "num", "42");
    assert!(result.matched());
    assert_eq!(result.leftover, 0);
}
