//! Output encoders, exercised through the engine API.

use rosie::EngineError;

use crate::{compile, engine_with};

fn encode(src: &str, exp: &str, encoder: &str, input: &str) -> Vec<u8> {
    let mut engine = engine_with(src);
    let id = compile(&mut engine, exp);
    engine
        .match_pattern(id, 0, encoder, input.as_bytes())
        .unwrap()
        .data
}

// ============================================================================
// json
// ============================================================================

#[test]
fn json_structure_matches_tree() {
    let input = "abc 42";
    let bytes = encode(
        "word = [:alpha:]+\nnum = [0-9]+\npair = word num",
        "pair",
        "json",
        input,
    );
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(value["type"], "pair");
    assert_eq!(value["s"], 1);
    assert_eq!(value["e"], 7);
    assert_eq!(value["data"], "abc 42");

    let subs = value["subs"].as_array().unwrap();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0]["type"], "word");
    assert_eq!(subs[0]["data"], "abc");
    assert_eq!(subs[1]["type"], "num");
    assert_eq!(subs[1]["s"], 5);
    assert_eq!(subs[1]["e"], 7);
}

// The json encoder is invertible: every field of every node survives a
// decode round trip.
#[test]
fn json_is_an_inverse_of_the_tree() {
    let input = "a 1 b 22";
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "findall:num");
    let result = engine.run_matcher(id, 0, input.as_bytes()).unwrap();
    let tree = result.tree.clone().unwrap();
    let bytes = rosie::encode("json", Some(&tree), input.as_bytes()).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    fn check(node: &rosie::Match, value: &serde_json::Value, input: &[u8]) {
        assert_eq!(value["type"], node.name.as_str());
        assert_eq!(value["s"].as_u64().unwrap() as usize, node.start + 1);
        assert_eq!(value["e"].as_u64().unwrap() as usize, node.end + 1);
        assert_eq!(
            value["data"].as_str().unwrap().as_bytes(),
            node.text(input)
        );
        let empty = Vec::new();
        let subs = value["subs"].as_array().unwrap_or(&empty);
        assert_eq!(subs.len(), node.subs.len());
        for (sub_node, sub_value) in node.subs.iter().zip(subs) {
            check(sub_node, sub_value, input);
        }
    }
    check(&tree, &value, input.as_bytes());
}

#[test]
fn json_null_when_no_match() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "num");
    let out = engine.match_pattern(id, 0, "json", b"abc").unwrap();
    assert_eq!(out.data, b"null");
    assert_eq!(out.leftover, 3);
}

// ============================================================================
// The line-oriented encoders
// ============================================================================

#[test]
fn bool_encoder() {
    assert_eq!(encode("num = [0-9]+", "num", "bool", "42"), b"true");
    assert_eq!(encode("num = [0-9]+", "num", "bool", "xy"), b"false");
}

#[test]
fn line_encoder_returns_whole_input() {
    assert_eq!(
        encode("num = [0-9]+", "find:num", "line", "abc 42 xyz"),
        b"abc 42 xyz\n"
    );
    assert_eq!(encode("num = [0-9]+", "num", "line", "abc"), b"");
}

// subs emits the printable leaf texts in left-to-right order.
#[test]
fn subs_encoder_concatenates_leaves() {
    let out = encode(
        "word = [:alpha:]+\nnum = [0-9]+\npair = word num",
        "pair",
        "subs",
        "abc 42",
    );
    assert_eq!(out, b"abc\n42\n");
}

#[test]
fn count_encoder_pairs_with_findall() {
    assert_eq!(
        encode("num = [0-9]+", "findall:num", "count", "1 2 3 4"),
        b"4"
    );
    assert_eq!(encode("num = [0-9]+", "num", "count", "7"), b"1");
}

#[test]
fn tree_encoder_colors_by_name() {
    let out = encode(
        "word = [:alpha:]+\npair = word word",
        "pair",
        "tree",
        "ab cd",
    );
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("pair"));
    assert!(text.contains("\x1b["));
    // Both word nodes get the same color, keyed by name
    let colored: Vec<&str> = text.matches("\x1b[3").collect();
    assert!(colored.len() >= 3);
}

// ============================================================================
// Encoder selection
// ============================================================================

#[test]
fn unknown_encoder_is_an_error() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "num");
    let err = engine.match_pattern(id, 0, "yaml", b"1").unwrap_err();
    assert!(matches!(err, EngineError::NoSuchEncoder(name) if name == "yaml"));
}

#[test]
fn color_is_an_alias_for_tree() {
    let mut engine = engine_with("num = [0-9]+");
    let id = compile(&mut engine, "num");
    let tree_out = engine.match_pattern(id, 0, "tree", b"5").unwrap().data;
    let color_out = engine.match_pattern(id, 0, "color", b"5").unwrap().data;
    assert_eq!(tree_out, color_out);
}
