//! PEG matcher IR and runtime.
//!
//! This crate provides the compiled representation of RPL patterns and the
//! machine that runs them:
//! - [`Pattern`]: a composable PEG value with explicit capture instructions
//! - [`ByteSet`]: 256-bit byte sets with the POSIX ASCII classes
//! - [`Match`]: the labeled match tree produced by a run
//! - [`match_pattern`]: the tree-walking matcher with capture stack,
//!   allocation budget, cooperative cancellation, halt, and tracing
//!
//! Matching follows PEG semantics exactly: ordered choice is
//! first-match-wins, quantifiers are greedy and do not backtrack once
//! committed, and predicates consume nothing.

pub mod charset;
pub mod error;
pub mod machine;
pub mod pattern;
pub mod trace;
pub mod tree;

pub use charset::ByteSet;
pub use error::MatchError;
pub use machine::{match_pattern, match_pattern_traced, MatchLimits, MatchResult};
pub use pattern::{verify_grammar, GrammarFault, Pattern, Rule};
pub use trace::{TraceEvent, Tracer};
pub use tree::Match;
