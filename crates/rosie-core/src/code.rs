use thiserror::Error;

/// Error codes for diagnostics.
///
/// Parse and compile errors are recoverable: the phase records the
/// diagnostic and keeps going so one pass can surface several problems.
/// E105 aborts the enclosing binding; the E2xx codes are fatal for the
/// engine call that produced them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Error)]
pub enum ErrorCode {
    // Parse errors (E001-E099)
    #[error("syntax error")]
    E001,
    #[error("invalid escape sequence")]
    E002,
    #[error("unterminated string literal")]
    E003,
    #[error("unterminated character set")]
    E004,
    #[error("unsupported language version")]
    E010,

    // Compile errors (E100-E199)
    #[error("undefined identifier")]
    E100,
    #[error("undefined character class")]
    E101,
    #[error("pattern may match the empty string")]
    E102,
    #[error("invalid repetition range")]
    E103,
    #[error("unknown quantifier")]
    E104,
    #[error("grammar error")]
    E105,

    // Loader and engine-call errors (E200-E299)
    #[error("loader error")]
    E200,
    #[error("no such pattern")]
    E201,
    #[error("no such encoder")]
    E202,
    #[error("engine call failed")]
    E203,
}

impl ErrorCode {
    /// Get the error code as a string (e.g., "E102").
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            ErrorCode::E010 => "E010",
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E103 => "E103",
            ErrorCode::E104 => "E104",
            ErrorCode::E105 => "E105",
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
        }
    }

    /// Get the default message for the code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::E001 => "syntax error",
            ErrorCode::E002 => "invalid escape sequence",
            ErrorCode::E003 => "unterminated string literal",
            ErrorCode::E004 => "unterminated character set",
            ErrorCode::E010 => "unsupported language version",
            ErrorCode::E100 => "undefined identifier",
            ErrorCode::E101 => "undefined character class",
            ErrorCode::E102 => "pattern may match the empty string",
            ErrorCode::E103 => "invalid repetition range",
            ErrorCode::E104 => "unknown quantifier",
            ErrorCode::E105 => "grammar error",
            ErrorCode::E200 => "loader error",
            ErrorCode::E201 => "no such pattern",
            ErrorCode::E202 => "no such encoder",
            ErrorCode::E203 => "engine call failed",
        }
    }
}
