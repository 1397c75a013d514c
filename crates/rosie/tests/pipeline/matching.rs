//! Core matching semantics: PEG ordering, anchors, boundaries, offsets.

use crate::{assert_no_match, compile, engine_with, match_tree, run};

// ============================================================================
// PEG semantics
// ============================================================================

#[test]
fn ordered_choice_commits_to_first_arm() {
    // "ab" wins even though "abc" would match more
    let result = run("x = {\"ab\" / \"abc\"}", "x", "abc");
    assert!(result.matched());
    assert_eq!(result.leftover, 1);
}

#[test]
fn quantifiers_are_greedy() {
    let result = run("x = {[0-9]+ \"9\"}", "x", "199");
    // [0-9]+ eats every digit; no backtracking gives the trailing "9" back
    assert!(!result.matched());
}

#[test]
fn predicates_consume_nothing() {
    let tree = match_tree("x = {&\"ab\" \"abc\"}", "x", "abc");
    assert_eq!((tree.start, tree.end), (0, 3));

    assert_no_match("y = {!\"a\" \"abc\"}", "y", "abc");
}

#[test]
fn match_consumes_prefix_and_reports_leftover() {
    let result = run("num = [0-9]+", "num", "123abc");
    assert!(result.matched());
    assert_eq!(result.leftover, 3);
}

// Universal property: matching on a ++ b either consumes |a ++ b| - L
// bytes with capture spans inside the consumed prefix, or fails with
// leftover = |a ++ b|.
#[test]
fn leftover_accounting_property() {
    let cases = [
        ("num = [0-9]+", "num", "123", "abc"),
        ("num = [0-9]+", "num", "", "abc"),
        ("w = [:alpha:]+", "w", "xyz", "123"),
    ];
    for (src, exp, a, b) in cases {
        let input = format!("{}{}", a, b);
        let result = run(src, exp, &input);
        match &result.tree {
            Some(tree) => {
                let consumed = input.len() - result.leftover;
                assert!(tree.end <= consumed);
            }
            None => assert_eq!(result.leftover, input.len()),
        }
    }
}

// ============================================================================
// Anchors and the dot
// ============================================================================

#[test]
fn anchors_match_input_edges() {
    let tree = match_tree("x = {^ \"ab\" $}", "x", "ab");
    assert_eq!((tree.start, tree.end), (0, 2));
    assert_no_match("x = {^ \"ab\" $}", "x", "abc");
}

#[test]
fn dot_matches_one_utf8_character() {
    let result = run("x = .", "x", "é");
    assert!(result.matched());
    assert_eq!(result.leftover, 0); // both bytes of the two-byte char

    let result = run("x = .", "x", "🎉!");
    assert_eq!(result.leftover, 1); // four bytes consumed, "!" left

    assert_no_match("x = .", "x", "");
}

#[test]
fn match_at_start_offset() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "num");
    let result = engine.run_matcher(id, 4, b"abc 42").unwrap();
    assert!(result.matched());
    let tree = result.tree.unwrap();
    assert_eq!((tree.start, tree.end), (4, 6));
}

// ============================================================================
// Boundary laws
// ============================================================================

#[test]
fn boundary_accepts_whitespace_runs() {
    let tree = match_tree("x = \"a\" \"b\"", "x", "a \t b");
    assert_eq!((tree.start, tree.end), (0, 5));
}

#[test]
fn boundary_accepts_punctuation_transition() {
    // No whitespace needed next to punctuation
    let tree = match_tree("x = \"a\" \";\"", "x", "a;");
    assert_eq!((tree.start, tree.end), (0, 2));
}

#[test]
fn boundary_rejects_word_to_word() {
    assert_no_match("x = \"a\" \"b\"", "x", "ab");
}

#[test]
fn boundary_accepts_input_edges() {
    // Trailing boundary in (e ~)+ is satisfied by end of input
    let result = run("x = (\"hi\")+", "x", "hi hi");
    assert!(result.matched());
    assert_eq!(result.leftover, 0);
}

// Cooked-boundary law: a cooked sequence A B accepts exactly what the
// explicit A ~ B accepts.
#[test]
fn cooked_boundary_law() {
    let inputs = ["a b", "ab", "a  b", "a;b", "a; b", "a", "b a"];
    for input in inputs {
        let implicit = run("x = \"a\" \"b\"", "x", input).matched();
        let explicit = run("x = {\"a\" ~ \"b\"}", "x", input).matched();
        assert_eq!(implicit, explicit, "law broken for {:?}", input);
    }
}

#[test]
fn raw_group_defeats_boundary() {
    let result = run("x = {\"a\" \"b\"}", "x", "ab");
    assert!(result.matched());
    assert_no_match("x = {\"a\" \"b\"}", "x", "a b");
}

// ============================================================================
// Captures
// ============================================================================

#[test]
fn captures_preserve_textual_order() {
    let tree = match_tree(
        "word = [:alpha:]+\nnum = [0-9]+\npair = word num",
        "pair",
        "abc 42",
    );
    assert_eq!(tree.name, "pair");
    assert_eq!(tree.subs.len(), 2);
    assert_eq!(tree.subs[0].name, "word");
    assert_eq!(tree.subs[1].name, "num");
    assert!(tree.subs[0].end <= tree.subs[1].start);
}

#[test]
fn alias_contributes_subs_without_a_node() {
    let tree = match_tree(
        "num = [0-9]+\nalias pair = num \",\" num\nline = pair",
        "line",
        "1, 2",
    );
    assert_eq!(tree.name, "line");
    // pair is an alias: its two nums attach directly to line
    assert_eq!(tree.subs.len(), 2);
    assert!(tree.subs.iter().all(|s| s.name == "num"));
}

#[test]
fn failed_arm_discards_its_captures() {
    let tree = match_tree(
        "a = \"x\"\nb = \"xy\"\npick = {a \"!\"} / b",
        "pick",
        "xy",
    );
    assert_eq!(tree.name, "pick");
    assert_eq!(tree.subs.len(), 1);
    assert_eq!(tree.subs[0].name, "b");
}
