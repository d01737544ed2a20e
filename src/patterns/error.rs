use thiserror::Error;

/// Which part of a pattern set a bad pattern was supplied for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Glob,
    Regex,
    Whitelist,
}

/// Errors produced while constructing patterns
#[derive(Debug, Error)]
pub enum PatternError {
    /// Empty pattern is invalid
    #[error("Empty {kind:?} pattern provided")]
    InvalidEmpty { kind: PatternKind },
    /// Regex failed to compile
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
    /// Glob failed to parse
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },
}

impl PatternError {
    #[must_use]
    pub fn regex_compile(pattern: &str, reason: &str) -> Self {
        Self::InvalidRegex {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn glob_parse(pattern: &str, reason: &str) -> Self {
        Self::InvalidGlob {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}
