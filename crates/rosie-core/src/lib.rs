//! Core types for the Rosie Pattern Language engine.
//!
//! This crate provides foundational types used throughout the RPL compiler
//! and matcher runtime:
//! - Source positions and spans
//! - Source files with line/column mapping
//! - Diagnostics, severities, and error codes
//! - A plain-text diagnostic renderer

pub mod code;
pub mod diagnostic;
pub mod render;
pub mod source;
pub mod span;

// Re-export commonly used types at crate root
pub use code::ErrorCode;
pub use diagnostic::{any_errors, Diagnostic, Severity};
pub use render::DiagnosticRenderer;
pub use source::{Location, SourceFile, SourceId};
pub use span::Span;

/// Language version understood by this implementation.
///
/// A source file may declare `rpl M.m`; a newer major version is rejected,
/// an older one accepted with a warning.
pub const RPL_VERSION: (u32, u32) = (1, 3);
