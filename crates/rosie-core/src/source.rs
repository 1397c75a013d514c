//! Source units and position lookup.
//!
//! Positions are resolved by scanning the text on demand. Diagnostics are
//! rare compared to matching work, so the source keeps no line table; one
//! pass over the prefix finds the line, the column, and the line's text
//! all at once.

use crate::span::Span;

/// Source unit identifier within one engine.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SourceId(u16);

impl SourceId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

/// The line around a byte offset: 1-indexed line and column, plus the
/// text of that line without its newline.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Location<'a> {
    pub line: u32,
    pub col: u32,
    pub text: &'a str,
}

/// A unit of RPL source text.
///
/// The `origin` names the load site: an importpath for library files, or
/// one of `"<top-level>"`, `"<expression>"`, `"<built-in>"` for source that
/// did not come from the loader.
#[derive(Clone, Debug)]
pub struct SourceFile {
    id: SourceId,
    origin: String,
    text: String,
}

impl SourceFile {
    pub fn new(id: SourceId, origin: String, text: String) -> Self {
        Self { id, origin, text }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Resolve a byte offset to the line containing it. Offsets past the
    /// end resolve to the last line.
    pub fn locate(&self, offset: u32) -> Location<'_> {
        let bytes = self.text.as_bytes();
        let offset = (offset as usize).min(bytes.len());

        let mut line = 1u32;
        let mut line_start = 0usize;
        for (i, &b) in bytes[..offset].iter().enumerate() {
            if b == b'\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        let line_end = bytes[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |i| offset + i);

        Location {
            line,
            col: (offset - line_start + 1) as u32,
            text: &self.text[line_start..line_end],
        }
    }

    /// The text covered by a span, clamped to the source.
    pub fn span_text(&self, span: Span) -> &str {
        let end = (span.end() as usize).min(self.text.len());
        let start = (span.start() as usize).min(end);
        self.text.get(start..end).unwrap_or("")
    }
}
