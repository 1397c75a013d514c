//! Match-tree encoders.
//!
//! Encoders are stateless functions of the match tree plus the original
//! input. The engine selects one by name per match call:
//!
//! | name | output |
//! |------|--------|
//! | `json` | nested `{"type", "s", "e", "data", "subs"}` objects |
//! | `line` | the whole matched input, newline-terminated |
//! | `bool` | `true` / `false` |
//! | `subs` | printable leaf texts, one per line |
//! | `tree` (alias `color`) | indented nodes with ANSI color per name |
//! | `count` | number of top-level sub-matches |

use rosie_peg::Match;
use serde_json::json;

/// Names accepted by [`encode`].
pub const ENCODERS: &[&str] = &["json", "line", "bool", "subs", "tree", "color", "count"];

/// The requested encoder does not exist.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct UnknownEncoder(pub String);

impl std::fmt::Display for UnknownEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no such encoder \"{}\"", self.0)
    }
}

impl std::error::Error for UnknownEncoder {}

/// Encode a match outcome. `tree` is `None` when the pattern did not
/// match.
pub fn encode(
    name: &str,
    tree: Option<&Match>,
    input: &[u8],
) -> Result<Vec<u8>, UnknownEncoder> {
    match name {
        "json" => Ok(encode_json(tree, input)),
        "line" => Ok(encode_line(tree, input)),
        "bool" => Ok(if tree.is_some() { b"true".to_vec() } else { b"false".to_vec() }),
        "subs" => Ok(encode_subs(tree, input)),
        "tree" | "color" => Ok(encode_tree(tree, input)),
        "count" => Ok(encode_count(tree)),
        other => Err(UnknownEncoder(other.to_string())),
    }
}

fn json_value(node: &Match, input: &[u8]) -> serde_json::Value {
    // Offsets are 1-based on the wire, as foreign callers expect
    let mut object = json!({
        "type": node.name,
        "s": node.start + 1,
        "e": node.end + 1,
        "data": String::from_utf8_lossy(node.text(input)),
    });
    if !node.subs.is_empty() {
        let subs: Vec<_> = node.subs.iter().map(|sub| json_value(sub, input)).collect();
        object["subs"] = serde_json::Value::Array(subs);
    }
    object
}

fn encode_json(tree: Option<&Match>, input: &[u8]) -> Vec<u8> {
    match tree {
        Some(node) => json_value(node, input).to_string().into_bytes(),
        None => b"null".to_vec(),
    }
}

fn encode_line(tree: Option<&Match>, input: &[u8]) -> Vec<u8> {
    match tree {
        Some(_) => {
            let mut out = input.to_vec();
            if out.last() != Some(&b'\n') {
                out.push(b'\n');
            }
            out
        }
        None => Vec::new(),
    }
}

fn is_printable(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(|&b| (0x20..=0x7e).contains(&b))
}

fn encode_subs(tree: Option<&Match>, input: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(tree) = tree {
        for leaf in tree.leaves() {
            let text = leaf.text(input);
            if is_printable(text) {
                out.extend_from_slice(text);
                out.push(b'\n');
            }
        }
    }
    out
}

/// Stable ANSI color for a pattern name.
fn color_for(name: &str) -> u32 {
    let hash: u32 = name
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    31 + hash % 6 // red..cyan
}

fn encode_tree(tree: Option<&Match>, input: &[u8]) -> Vec<u8> {
    let mut out = String::new();
    if let Some(tree) = tree {
        tree.walk(&mut |node, depth| {
            let text = String::from_utf8_lossy(node.text(input));
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!(
                "\x1b[{}m{}\x1b[0m [{}..{}] {}\n",
                color_for(&node.name),
                node.name,
                node.start,
                node.end,
                text
            ));
        });
    }
    out.into_bytes()
}

fn encode_count(tree: Option<&Match>) -> Vec<u8> {
    let count = match tree {
        Some(node) if !node.subs.is_empty() => node.subs.len(),
        Some(_) => 1,
        None => 0,
    };
    count.to_string().into_bytes()
}
