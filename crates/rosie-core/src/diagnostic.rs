//! Diagnostics.
//!
//! A [`Diagnostic`] is a plain value: the parse and compile phases push
//! them into lists and keep going, and callers get the whole list together
//! with a success flag. Construction is chainable on the value itself; a
//! diagnostic starts out carrying its code's default message.

use crate::code::ErrorCode;
use crate::span::Span;

/// Severity level of a diagnostic. Only errors fail the unit; warnings
/// ride along.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Warning,
}

/// A diagnostic with location and context.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    severity: Severity,
    code: ErrorCode,
    message: String,
    span: Span,
    label: Option<String>,
    notes: Vec<String>,
}

impl Diagnostic {
    fn new(severity: Severity, code: ErrorCode, span: Span) -> Self {
        Self {
            severity,
            code,
            message: code.message().to_string(),
            span,
            label: None,
            notes: Vec::new(),
        }
    }

    /// An error diagnostic carrying the code's default message.
    pub fn error(code: ErrorCode, span: Span) -> Self {
        Self::new(Severity::Error, code, span)
    }

    /// A warning diagnostic carrying the code's default message.
    pub fn warning(code: ErrorCode, span: Span) -> Self {
        Self::new(Severity::Warning, code, span)
    }

    /// Replace the default message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the label printed under the caret.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

/// True if any diagnostic in the list is an error.
pub fn any_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
