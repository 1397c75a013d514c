//! The compiled matcher representation.
//!
//! A [`Pattern`] is a composable PEG value. The compiler lowers AST nodes
//! into this IR; the machine in [`crate::machine`] walks it against an
//! input buffer. Grammars are tied as a rule table with [`Pattern::Call`]
//! referencing rules by index, so mutual recursion needs no cyclic
//! ownership.

use std::collections::HashSet;

use crate::charset::ByteSet;

/// One named production inside a grammar table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Rule {
    pub name: String,
    pub pattern: Pattern,
}

impl Rule {
    pub fn new(name: impl Into<String>, pattern: Pattern) -> Self {
        Self {
            name: name.into(),
            pattern,
        }
    }
}

/// A compiled PEG matcher.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Pattern {
    /// Exact byte string.
    Literal(Vec<u8>),
    /// One byte drawn from the set.
    Set(ByteSet),
    /// Any single byte.
    Any,
    /// Concatenation, in order.
    Seq(Vec<Pattern>),
    /// Ordered choice: first match wins, no backtracking once an arm
    /// commits.
    Choice(Vec<Pattern>),
    /// Greedy repetition. `max = None` means unbounded; `* + ? {n,m}` all
    /// lower to this.
    Repeat {
        pat: Box<Pattern>,
        min: u32,
        max: Option<u32>,
    },
    /// Positive lookahead (`&p`). Zero-width; captures inside are
    /// discarded.
    Lookahead(Box<Pattern>),
    /// Negative lookahead (`!p`). Zero-width.
    Negation(Box<Pattern>),
    /// Fixed-width look-behind: the body must match the bytes immediately
    /// before the current position. The compiler only constructs this for
    /// bodies with a known fixed length.
    Behind(Box<Pattern>),
    /// Zero-width match at the start of the subject.
    AtStart,
    /// Zero-width match at the end of the subject.
    AtEnd,
    /// Invoke a rule of the innermost enclosing grammar by index.
    Call(usize),
    /// A grammar: rule 0 is the entry production.
    Grammar { rules: Vec<Rule> },
    /// Named capture: on success, emits a labeled subtree covering the
    /// matched span.
    Capture { name: String, pat: Box<Pattern> },
    /// Zero-width labeled emit carrying fixed text (`message`/`error`).
    Constant { name: String, text: String },
    /// Unrecoverable stop: terminates the run with `aborted = true`.
    Halt,
}

impl Pattern {
    /// Convenience constructor for a sequence, flattening the trivial
    /// cases.
    pub fn seq(mut pats: Vec<Pattern>) -> Pattern {
        if pats.len() == 1 {
            pats.pop().unwrap()
        } else {
            Pattern::Seq(pats)
        }
    }

    /// Convenience constructor for an ordered choice.
    pub fn choice(mut pats: Vec<Pattern>) -> Pattern {
        if pats.len() == 1 {
            pats.pop().unwrap()
        } else {
            Pattern::Choice(pats)
        }
    }

    /// Can this pattern succeed without consuming input?
    ///
    /// Used for the quantified-empty check and by the grammar verifier.
    /// `Call` is treated as potentially empty; the compiler only performs
    /// the loop-safety check outside grammar mode, where `Call` cannot
    /// occur.
    pub fn nullable(&self) -> bool {
        match self {
            Pattern::Literal(bytes) => bytes.is_empty(),
            Pattern::Set(_) | Pattern::Any | Pattern::Halt => false,
            Pattern::Seq(items) => items.iter().all(Pattern::nullable),
            Pattern::Choice(items) => items.iter().any(Pattern::nullable),
            Pattern::Repeat { pat, min, .. } => *min == 0 || pat.nullable(),
            Pattern::Lookahead(_)
            | Pattern::Negation(_)
            | Pattern::Behind(_)
            | Pattern::AtStart
            | Pattern::AtEnd
            | Pattern::Constant { .. } => true,
            Pattern::Call(_) => true,
            Pattern::Grammar { rules } => {
                let mut visited = HashSet::new();
                nullable_in(rules, 0, &mut visited)
            }
            Pattern::Capture { pat, .. } => pat.nullable(),
        }
    }

    /// Number of bytes this pattern always consumes, if that is a fixed
    /// quantity. `Behind` requires its body to have a fixed length.
    pub fn fixed_len(&self) -> Option<usize> {
        match self {
            Pattern::Literal(bytes) => Some(bytes.len()),
            Pattern::Set(_) | Pattern::Any => Some(1),
            Pattern::Seq(items) => {
                let mut total = 0;
                for item in items {
                    total += item.fixed_len()?;
                }
                Some(total)
            }
            Pattern::Choice(items) => {
                let mut len = None;
                for item in items {
                    let l = item.fixed_len()?;
                    match len {
                        None => len = Some(l),
                        Some(prev) if prev == l => {}
                        Some(_) => return None,
                    }
                }
                len
            }
            Pattern::Repeat { pat, min, max } => {
                if Some(*min) == *max {
                    pat.fixed_len().map(|l| l * *min as usize)
                } else {
                    None
                }
            }
            Pattern::Lookahead(_)
            | Pattern::Negation(_)
            | Pattern::Behind(_)
            | Pattern::AtStart
            | Pattern::AtEnd
            | Pattern::Constant { .. } => Some(0),
            Pattern::Capture { pat, .. } => pat.fixed_len(),
            Pattern::Call(_) | Pattern::Grammar { .. } | Pattern::Halt => None,
        }
    }

    /// Short human-readable label for tracing output.
    pub fn label(&self) -> String {
        match self {
            Pattern::Literal(bytes) => {
                format!("literal {:?}", String::from_utf8_lossy(bytes))
            }
            Pattern::Set(_) => "charset".into(),
            Pattern::Any => "any byte".into(),
            Pattern::Seq(items) => format!("sequence({})", items.len()),
            Pattern::Choice(items) => format!("choice({})", items.len()),
            Pattern::Repeat { min, max, .. } => match max {
                Some(max) => format!("repeat{{{},{}}}", min, max),
                None => format!("repeat{{{},}}", min),
            },
            Pattern::Lookahead(_) => "lookahead".into(),
            Pattern::Negation(_) => "negation".into(),
            Pattern::Behind(_) => "behind".into(),
            Pattern::AtStart => "start of input".into(),
            Pattern::AtEnd => "end of input".into(),
            Pattern::Call(idx) => format!("call {}", idx),
            Pattern::Grammar { rules } => format!("grammar <{}>", rules[0].name),
            Pattern::Capture { name, .. } => format!("capture <{}>", name),
            Pattern::Constant { name, .. } => format!("constant <{}>", name),
            Pattern::Halt => "halt".into(),
        }
    }
}

/// Can rule `idx` of `rules` succeed without consuming input?
///
/// Rules already on the walk are assumed non-nullable, which breaks the
/// recursion; a genuinely left-recursive grammar is caught separately by
/// [`verify_grammar`].
fn nullable_in(rules: &[Rule], idx: usize, visited: &mut HashSet<usize>) -> bool {
    if !visited.insert(idx) {
        return false;
    }
    let result = pattern_nullable_in(rules, &rules[idx].pattern, visited);
    visited.remove(&idx);
    result
}

fn pattern_nullable_in(rules: &[Rule], pat: &Pattern, visited: &mut HashSet<usize>) -> bool {
    match pat {
        Pattern::Call(idx) => *idx < rules.len() && nullable_in(rules, *idx, visited),
        Pattern::Seq(items) => items
            .iter()
            .all(|item| pattern_nullable_in(rules, item, visited)),
        Pattern::Choice(items) => items
            .iter()
            .any(|item| pattern_nullable_in(rules, item, visited)),
        Pattern::Repeat { pat, min, .. } => {
            *min == 0 || pattern_nullable_in(rules, pat, visited)
        }
        Pattern::Capture { pat, .. } => pattern_nullable_in(rules, pat, visited),
        other => other.nullable(),
    }
}

/// A defect found while tying a grammar's knot.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum GrammarFault {
    /// A rule can invoke itself again at its left edge without consuming
    /// any input.
    LeftRecursive { rule: String },
    /// A `Call` index points outside the rule table.
    UndefinedRule { index: usize },
}

impl std::fmt::Display for GrammarFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarFault::LeftRecursive { rule } => {
                write!(f, "rule \"{}\" is left-recursive", rule)
            }
            GrammarFault::UndefinedRule { index } => {
                write!(f, "call to undefined rule #{}", index)
            }
        }
    }
}

/// Verify a grammar table before it is tied into [`Pattern::Grammar`].
///
/// Detects calls outside the table and left recursion: a cycle of rules
/// each reachable from the previous one at the left edge, before any input
/// is consumed.
pub fn verify_grammar(rules: &[Rule]) -> Result<(), GrammarFault> {
    for rule in rules {
        check_call_indices(rules, &rule.pattern)?;
    }

    // Edge i -> j: rule j can be entered from rule i with nothing consumed.
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); rules.len()];
    for (i, rule) in rules.iter().enumerate() {
        let mut targets = Vec::new();
        left_edge_calls(rules, &rule.pattern, &mut targets);
        edges[i] = targets;
    }

    for start in 0..rules.len() {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &next in &edges[node] {
                if next == start {
                    return Err(GrammarFault::LeftRecursive {
                        rule: rules[start].name.clone(),
                    });
                }
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
    }
    Ok(())
}

fn check_call_indices(rules: &[Rule], pat: &Pattern) -> Result<(), GrammarFault> {
    match pat {
        Pattern::Call(idx) => {
            if *idx >= rules.len() {
                return Err(GrammarFault::UndefinedRule { index: *idx });
            }
            Ok(())
        }
        Pattern::Seq(items) | Pattern::Choice(items) => {
            for item in items {
                check_call_indices(rules, item)?;
            }
            Ok(())
        }
        Pattern::Repeat { pat, .. }
        | Pattern::Lookahead(pat)
        | Pattern::Negation(pat)
        | Pattern::Behind(pat)
        | Pattern::Capture { pat, .. } => check_call_indices(rules, pat),
        // A nested grammar's calls index its own table
        _ => Ok(()),
    }
}

/// Collect rule indices reachable at the left edge of `pat`, before any
/// input is consumed.
fn left_edge_calls(rules: &[Rule], pat: &Pattern, out: &mut Vec<usize>) {
    match pat {
        Pattern::Call(idx) => out.push(*idx),
        Pattern::Seq(items) => {
            for item in items {
                left_edge_calls(rules, item, out);
                let consumes = match item {
                    Pattern::Call(idx) if *idx < rules.len() => {
                        let mut visited = HashSet::new();
                        !nullable_in(rules, *idx, &mut visited)
                    }
                    other => {
                        let mut visited = HashSet::new();
                        !pattern_nullable_in(rules, other, &mut visited)
                    }
                };
                if consumes {
                    break;
                }
            }
        }
        Pattern::Choice(items) => {
            for item in items {
                left_edge_calls(rules, item, out);
            }
        }
        Pattern::Repeat { pat, .. }
        | Pattern::Lookahead(pat)
        | Pattern::Negation(pat)
        | Pattern::Capture { pat, .. } => left_edge_calls(rules, pat, out),
        // Behind looks backwards; nested grammars scope their own calls
        _ => {}
    }
}
