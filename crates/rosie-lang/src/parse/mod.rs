//! RPL source parsing.
//!
//! Parsing is three small layers, none of which panic on bad input:
//! - [`preparse`] scans for the optional `rpl M.m` version declaration and
//!   checks it against the supported version
//! - the scanner turns bytes into tokens, collecting lexical diagnostics
//! - the parser builds a [`crate::ast::Program`] with statement-level error
//!   recovery, leaving `SyntaxError` placeholders in the tree

mod parser;
mod scanner;

pub use parser::{parse_expression, parse_program, ParseOutput};

use rosie_core::{Diagnostic, ErrorCode, Span, RPL_VERSION};

/// Result of scanning for a version declaration: the declared version (if
/// any), the byte offset where real statements begin, and any diagnostics.
pub fn preparse(text: &str) -> (Option<(u32, u32)>, usize, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            offset += line.len();
            continue;
        }
        // First significant line: a version declaration or ordinary source
        let Some(rest) = trimmed.strip_prefix("rpl") else {
            return (None, 0, diagnostics);
        };
        if !rest.starts_with(char::is_whitespace) {
            return (None, 0, diagnostics);
        }
        let decl_start = (offset + indent) as u32;
        let version_text = rest.trim().trim_end_matches(|c: char| c == ';');
        let span = Span::from_offsets(decl_start, (offset + line.trim_end().len()) as u32);
        match parse_version(version_text) {
            Some(version) => {
                check_version(version, span, &mut diagnostics);
                return (Some(version), offset + line.len(), diagnostics);
            }
            None => {
                diagnostics.push(
                    Diagnostic::error(ErrorCode::E001, span)
                        .with_message(format!(
                            "malformed version declaration \"{}\"",
                            version_text
                        ))
                        .with_label("expected `rpl M.m`"),
                );
                return (None, offset + line.len(), diagnostics);
            }
        }
    }
    (None, 0, diagnostics)
}

fn parse_version(text: &str) -> Option<(u32, u32)> {
    let (major, minor) = text.split_once('.')?;
    Some((major.trim().parse().ok()?, minor.trim().parse().ok()?))
}

fn check_version(version: (u32, u32), span: Span, diagnostics: &mut Vec<Diagnostic>) {
    if version > RPL_VERSION {
        diagnostics.push(Diagnostic::error(ErrorCode::E010, span).with_message(format!(
            "rpl version {}.{} is newer than the supported {}.{}",
            version.0, version.1, RPL_VERSION.0, RPL_VERSION.1
        )));
    } else if version.0 < RPL_VERSION.0 {
        diagnostics.push(Diagnostic::warning(ErrorCode::E010, span).with_message(format!(
            "rpl version {}.{} predates the supported {}.{}",
            version.0, version.1, RPL_VERSION.0, RPL_VERSION.1
        )));
    }
}
