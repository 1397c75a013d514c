//! Character classes: POSIX names, ranges, lists, complements, unions.

use crate::{assert_no_match, match_tree, run};

#[test]
fn posix_classes_use_ascii_locale() {
    assert!(run("", "[:alpha:]+", "abcXYZ").matched());
    assert_no_match("", "[:alpha:]+", "123");
    assert!(run("", "[:punct:]+", "!;~").matched());
    assert!(run("", "[:xdigit:]+", "deadBEEF").matched());
    assert_no_match("", "[:xdigit:]+", "ghij");
}

#[test]
fn range_and_charlist() {
    let result = run("", "[a-f]+", "fedcba-");
    assert!(result.matched());
    assert_eq!(result.leftover, 1);

    assert!(run("", "[aeiou]+", "eau").matched());
    assert_no_match("", "[aeiou]+", "xyz");
}

#[test]
fn complement_is_over_all_bytes() {
    let result = run("", "[^0-9]+", "ab\x01\x7f");
    assert!(result.matched());
    assert_eq!(result.leftover, 0);
}

// Scenario: [^0-9]+ against "" is accepted at compile time (the body
// cannot match empty) and simply fails at runtime with leftover 0.
#[test]
fn complement_plus_on_empty_input() {
    let result = run("", "[^0-9]+", "");
    assert!(!result.matched());
    assert!(!result.aborted);
    assert_eq!(result.leftover, 0);
}

#[test]
fn complemented_named_class() {
    assert!(run("", "[:^alpha:]+", "123 456").matched());
    assert_no_match("", "[:^alpha:]+", "abc");
}

#[test]
fn union_of_sets() {
    let result = run("", "[[:alpha:] [0-9]]+", "a1b2");
    assert!(result.matched());
    assert_eq!(result.leftover, 0);
    assert_no_match("", "[[:alpha:] [0-9]]+", "  ");
}

#[test]
fn complement_of_union() {
    let result = run("", "[^[:alpha:] [0-9]]+", " ,;");
    assert!(result.matched());
    assert_no_match("", "[^[:alpha:] [0-9]]+", "a1");
}

#[test]
fn escaped_chars_in_lists() {
    assert!(run("", "[\\-\\]]+", "-]").matched());
    assert!(run("", "[\\x41-\\x43]+", "ABC").matched());
    assert_no_match("", "[\\x41-\\x43]+", "D");
}

#[test]
fn mixed_ranges_and_singles() {
    let tree = match_tree("ident = {[a-z0-9_]+}", "ident", "ab_3");
    assert_eq!((tree.start, tree.end), (0, 4));
}
