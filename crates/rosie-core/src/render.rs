//! Plain-text diagnostic rendering.
//!
//! Output follows the familiar compiler shape: a severity header, the
//! location, the offending line with a caret row underneath, then any
//! notes.

use std::fmt::Write;

use crate::diagnostic::{Diagnostic, Severity};
use crate::source::SourceFile;

/// Renders diagnostics against their source file.
pub struct DiagnosticRenderer<'a> {
    source: &'a SourceFile,
}

impl<'a> DiagnosticRenderer<'a> {
    pub fn new(source: &'a SourceFile) -> Self {
        Self { source }
    }

    /// Render one diagnostic to a string.
    pub fn render_to_string(&self, diag: &Diagnostic) -> String {
        let loc = self.source.locate(diag.span().start());
        let severity = match diag.severity() {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}[{}]: {}",
            severity,
            diag.code().as_str(),
            diag.message()
        );
        let _ = writeln!(
            out,
            "  --> {}:{}:{}",
            self.source.origin(),
            loc.line,
            loc.col
        );

        // Snippet with a caret row; the caret never runs past the line
        let gutter = " ".repeat(loc.line.to_string().len());
        let indent = (loc.col - 1) as usize;
        let room = loc.text.len().saturating_sub(indent);
        let carets = (diag.span().len() as usize).clamp(1, room.max(1));

        let _ = writeln!(out, "{} |", gutter);
        let _ = writeln!(out, "{} | {}", loc.line, loc.text);
        let _ = write!(
            out,
            "{} | {}{}",
            gutter,
            " ".repeat(indent),
            "^".repeat(carets)
        );
        if let Some(label) = diag.label() {
            let _ = write!(out, " {}", label);
        }
        out.push('\n');

        for note in diag.notes() {
            let _ = writeln!(out, "  = note: {}", note);
        }
        out
    }
}
