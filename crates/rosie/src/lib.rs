//! Rosie Pattern Language engine.
//!
//! This crate provides the [`Engine`], the main entry point for:
//! - Loading RPL source and importing packages
//! - Compiling expressions to matcher handles
//! - Matching compiled patterns against byte input
//! - Encoding match trees in several output formats
//! - Tracing a match attempt
//!
//! # Quick Start
//!
//! ```no_run
//! use rosie::Engine;
//!
//! let mut engine = Engine::new();
//! let loaded = engine.load_source("number = [0-9]+");
//! assert!(loaded.ok);
//! let pat = engine.compile_expression("find:number").unwrap();
//! let out = engine.match_pattern(pat, 0, "json", b"abc 42").unwrap();
//! println!("{}", String::from_utf8_lossy(&out.data));
//! ```

pub mod encoder;
pub mod engine;
pub mod loader;

pub use encoder::encode;
pub use engine::{
    Engine, EngineConfig, EngineError, ImportResult, LoadResult, MatchOutput, MatcherId,
    TraceOutput, MIN_ALLOC_LIMIT,
};
pub use loader::{FsLoader, LoadedSource, Loader, LoaderError, MemLoader};

// Re-export the types callers handle day to day
pub use rosie_core::{Diagnostic, DiagnosticRenderer, ErrorCode, Severity, SourceFile};
pub use rosie_peg::{Match, MatchResult};
