//! The tree-walking PEG machine.
//!
//! A single call to [`match_pattern`] runs one compiled pattern against one
//! input buffer. The machine is zero-copy over the input, strictly
//! sequential, and observes a cooperative cancellation flag at each
//! repetition iteration, each choice arm, and each grammar call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::error::MatchError;
use crate::pattern::{Pattern, Rule};
use crate::trace::Tracer;
use crate::tree::Match;

/// Default ceiling on grammar call nesting.
const DEFAULT_MAX_CALL_DEPTH: usize = 500;

/// Approximate heap cost charged per capture node, on top of its name.
const NODE_COST: usize = std::mem::size_of::<Match>();

/// Resource limits for one match run.
#[derive(Clone, Copy, Debug)]
pub struct MatchLimits {
    /// Ceiling on capture-tree bytes; 0 means unlimited.
    pub alloc_limit: usize,
    /// Ceiling on grammar call nesting.
    pub max_call_depth: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self {
            alloc_limit: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Outcome of one match run.
#[derive(Clone, Debug)]
pub struct MatchResult {
    /// The match tree, or `None` if the pattern did not match. An aborted
    /// run may carry a partial tree.
    pub tree: Option<Match>,
    /// Bytes of input left unconsumed. A failed match leaves the whole
    /// input over.
    pub leftover: usize,
    /// True if the run stopped early (halt, limit, or cancellation).
    pub aborted: bool,
    /// Why the run aborted, when it did.
    pub error: Option<MatchError>,
    /// Capture-tree bytes charged during the run.
    pub alloc_used: usize,
    /// Time spent matching.
    pub tmatch: Duration,
}

impl MatchResult {
    /// True if the pattern matched to completion.
    pub fn matched(&self) -> bool {
        self.tree.is_some() && !self.aborted
    }
}

type Step = Result<Option<usize>, MatchError>;

struct Machine<'p, 'i> {
    input: &'i [u8],
    grammars: SmallVec<[&'p [Rule]; 4]>,
    call_depth: usize,
    limits: MatchLimits,
    cancel: Option<&'i AtomicBool>,
    used: usize,
    tracer: Option<Tracer>,
}

impl<'p, 'i> Machine<'p, 'i> {
    fn check_cancel(&self) -> Result<(), MatchError> {
        if let Some(flag) = self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(MatchError::Cancelled);
            }
        }
        Ok(())
    }

    fn charge(&mut self, name_len: usize) -> Result<(), MatchError> {
        self.used += NODE_COST + name_len;
        if self.limits.alloc_limit != 0 && self.used > self.limits.alloc_limit {
            return Err(MatchError::AllocLimit {
                limit: self.limits.alloc_limit,
                used: self.used,
            });
        }
        Ok(())
    }

    fn run(&mut self, pat: &'p Pattern, pos: usize, subs: &mut Vec<Match>) -> Step {
        if let Some(tracer) = &mut self.tracer {
            tracer.enter(pat.label(), pos);
        }
        let result = self.run_inner(pat, pos, subs);
        if let Some(tracer) = &mut self.tracer {
            tracer.exit(&result);
        }
        result
    }

    fn run_inner(&mut self, pat: &'p Pattern, pos: usize, subs: &mut Vec<Match>) -> Step {
        match pat {
            Pattern::Literal(bytes) => {
                if self.input[pos.min(self.input.len())..].starts_with(bytes) {
                    Ok(Some(pos + bytes.len()))
                } else {
                    Ok(None)
                }
            }
            Pattern::Set(set) => {
                if pos < self.input.len() && set.contains(self.input[pos]) {
                    Ok(Some(pos + 1))
                } else {
                    Ok(None)
                }
            }
            Pattern::Any => {
                if pos < self.input.len() {
                    Ok(Some(pos + 1))
                } else {
                    Ok(None)
                }
            }
            Pattern::Seq(items) => {
                let entry = subs.len();
                let mut cur = pos;
                for item in items {
                    match self.run(item, cur, subs)? {
                        Some(end) => cur = end,
                        None => {
                            subs.truncate(entry);
                            return Ok(None);
                        }
                    }
                }
                Ok(Some(cur))
            }
            Pattern::Choice(items) => {
                let entry = subs.len();
                for arm in items {
                    self.check_cancel()?;
                    match self.run(arm, pos, subs)? {
                        Some(end) => return Ok(Some(end)),
                        None => subs.truncate(entry),
                    }
                }
                Ok(None)
            }
            Pattern::Repeat { pat, min, max } => {
                let entry = subs.len();
                let mut count = 0u32;
                let mut cur = pos;
                loop {
                    if let Some(max) = max {
                        if count >= *max {
                            break;
                        }
                    }
                    self.check_cancel()?;
                    let mark = subs.len();
                    match self.run(pat, cur, subs)? {
                        Some(end) if end == cur => {
                            // Zero-width body: one iteration stands for any
                            // number of them
                            if count < *min {
                                count = *min;
                            }
                            break;
                        }
                        Some(end) => {
                            cur = end;
                            count += 1;
                        }
                        None => {
                            subs.truncate(mark);
                            break;
                        }
                    }
                }
                if count >= *min {
                    Ok(Some(cur))
                } else {
                    subs.truncate(entry);
                    Ok(None)
                }
            }
            Pattern::Lookahead(pat) => {
                let entry = subs.len();
                let result = self.run(pat, pos, subs)?;
                subs.truncate(entry);
                Ok(result.map(|_| pos))
            }
            Pattern::Negation(pat) => {
                let entry = subs.len();
                let result = self.run(pat, pos, subs)?;
                subs.truncate(entry);
                match result {
                    Some(_) => Ok(None),
                    None => Ok(Some(pos)),
                }
            }
            Pattern::Behind(pat) => {
                let Some(width) = pat.fixed_len() else {
                    return Ok(None);
                };
                if pos < width {
                    return Ok(None);
                }
                let entry = subs.len();
                let result = self.run(pat, pos - width, subs)?;
                subs.truncate(entry);
                match result {
                    Some(end) if end == pos => Ok(Some(pos)),
                    _ => Ok(None),
                }
            }
            Pattern::AtStart => {
                if pos == 0 {
                    Ok(Some(pos))
                } else {
                    Ok(None)
                }
            }
            Pattern::AtEnd => {
                if pos == self.input.len() {
                    Ok(Some(pos))
                } else {
                    Ok(None)
                }
            }
            Pattern::Call(idx) => {
                self.check_cancel()?;
                let Some(rules) = self.grammars.last().copied() else {
                    debug_assert!(false, "Call outside a grammar");
                    return Ok(None);
                };
                let Some(rule) = rules.get(*idx) else {
                    debug_assert!(false, "Call index out of range");
                    return Ok(None);
                };
                if self.call_depth >= self.limits.max_call_depth {
                    return Err(MatchError::DepthLimit {
                        limit: self.limits.max_call_depth,
                    });
                }
                self.call_depth += 1;
                let result = self.run(&rule.pattern, pos, subs);
                self.call_depth -= 1;
                result
            }
            Pattern::Grammar { rules } => {
                self.grammars.push(rules.as_slice());
                let result = self.run(&rules[0].pattern, pos, subs);
                self.grammars.pop();
                result
            }
            Pattern::Capture { name, pat } => {
                let mut inner = Vec::new();
                match self.run(pat, pos, &mut inner) {
                    Ok(Some(end)) => {
                        self.charge(name.len())?;
                        subs.push(Match {
                            name: name.clone(),
                            start: pos,
                            end,
                            subs: inner,
                            data: None,
                        });
                        Ok(Some(end))
                    }
                    Ok(None) => Ok(None),
                    // Aborted mid-capture: the open frame is abandoned but
                    // its completed children survive in the parent
                    Err(err) => {
                        subs.append(&mut inner);
                        Err(err)
                    }
                }
            }
            Pattern::Constant { name, text } => {
                self.charge(name.len() + text.len())?;
                subs.push(Match {
                    name: name.clone(),
                    start: pos,
                    end: pos,
                    subs: Vec::new(),
                    data: Some(text.clone()),
                });
                Ok(Some(pos))
            }
            Pattern::Halt => Err(MatchError::Halted),
        }
    }
}

/// Build the root of the result tree. The compiler wraps top-level
/// expressions in a capture, so `subs` normally holds exactly one node;
/// anything else gets an anonymous root.
fn finish_tree(mut subs: Vec<Match>, start: usize, end: usize) -> Match {
    if subs.len() == 1 {
        subs.pop().unwrap()
    } else {
        Match {
            name: "*".into(),
            start,
            end,
            subs,
            data: None,
        }
    }
}

fn run_match(
    pat: &Pattern,
    input: &[u8],
    start: usize,
    limits: MatchLimits,
    cancel: Option<&AtomicBool>,
    tracer: Option<Tracer>,
) -> (MatchResult, Option<Tracer>) {
    let start = start.min(input.len());
    let mut machine = Machine {
        input,
        grammars: SmallVec::new(),
        call_depth: 0,
        limits,
        cancel,
        used: 0,
        tracer,
    };

    let t0 = Instant::now();
    let mut subs = Vec::new();
    let outcome = machine.run(pat, start, &mut subs);
    let tmatch = t0.elapsed();

    let result = match outcome {
        Ok(Some(end)) => MatchResult {
            tree: Some(finish_tree(subs, start, end)),
            leftover: input.len() - end,
            aborted: false,
            error: None,
            alloc_used: machine.used,
            tmatch,
        },
        Ok(None) => MatchResult {
            tree: None,
            leftover: input.len(),
            aborted: false,
            error: None,
            alloc_used: machine.used,
            tmatch,
        },
        Err(error) => {
            // Soft abort: hand back whatever the capture stack holds
            let tree = if subs.is_empty() {
                None
            } else {
                Some(finish_tree(subs, start, start))
            };
            MatchResult {
                tree,
                leftover: input.len(),
                aborted: true,
                error: Some(error),
                alloc_used: machine.used,
                tmatch,
            }
        }
    };
    (result, machine.tracer)
}

/// Run a compiled pattern against `input`, starting at byte `start`.
pub fn match_pattern(
    pat: &Pattern,
    input: &[u8],
    start: usize,
    limits: MatchLimits,
    cancel: Option<&AtomicBool>,
) -> MatchResult {
    run_match(pat, input, start, limits, cancel, None).0
}

/// Like [`match_pattern`], also recording a trace of every node visited.
pub fn match_pattern_traced(
    pat: &Pattern,
    input: &[u8],
    start: usize,
    limits: MatchLimits,
) -> (MatchResult, Tracer) {
    let (result, tracer) = run_match(pat, input, start, limits, None, Some(Tracer::new()));
    (result, tracer.expect("tracer was supplied"))
}
