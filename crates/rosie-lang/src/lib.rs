//! Language front-end for the Rosie Pattern Language.
//!
//! This crate turns RPL source text into compiled matchers:
//! - [`ast`]: the abstract syntax tree
//! - [`parse`]: preparser (version declaration), scanner, and
//!   error-recovering recursive-descent parser
//! - [`env`]: lexically scoped binding environments and package entries
//! - [`prelude`]: the shared read-only built-in environment
//!   (`.` `^` `$` `~` `halt`, the macros, and the pfunctions)
//! - [`compile`]: the AST-to-IR compiler with cooked/raw boundary
//!   threading, grammar knot-tying, and capture handling

pub mod ast;
pub mod compile;
pub mod env;
pub mod parse;
pub mod prelude;

pub use ast::{Binding, Exp, ExpKind, Import, PredicateKind, Program};
pub use compile::{compile_block, compile_expression, CompileResult};
pub use env::{EnvValue, Environment, PatternValue};
pub use parse::{parse_expression, parse_program, preparse, ParseOutput};
pub use prelude::prelude;
