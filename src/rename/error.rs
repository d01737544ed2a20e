use thiserror::Error;

use crate::fs::FsError;

/// Rename failures. Everything after validation has already been rolled
/// back when one of these is returned.
#[derive(Debug, Error)]
pub enum RenameError {
    /// Source and target path must differ in their last segment only
    #[error("Rename must change only the last segment: '{from}' -> '{to}'")]
    NotASingleSegmentMove { from: String, to: String },

    #[error("Invalid tag name '{0}'")]
    InvalidName(String),

    #[error("Unknown tag '{0}'")]
    UnknownTag(String),

    #[error("Tag '{0}' may not be renamed")]
    NotAllowed(String),

    #[error("Tag '{0}' already exists")]
    AlreadyExists(String),

    #[error("File operation failed: {0}")]
    Fs(#[from] FsError),

    /// A pass did not reduce the number of matching items
    #[error("Likely infinite loop while rewriting {step}: {remaining} item(s) still carry the tag")]
    LikelyInfiniteLoop { step: &'static str, remaining: usize },

    #[error("Gave up rewriting {step} after {iterations} iterations")]
    TooManyIterations { step: &'static str, iterations: usize },

    /// No entry below the input root carries the marker
    #[error("No occurrence of '#{tag}' found for {path}")]
    MarkerNotFound { tag: String, path: String },

    /// The primary failure plus everything that could not be undone
    #[error("{primary}; reverting failed: {}", .failures.join("; "))]
    RevertFailed {
        primary: Box<RenameError>,
        failures: Vec<String>,
    },
}
