//! Traversal error types
//!
//! None of these abort a traversal. The walker records them and treats the
//! offending node as non-matching; callers drain them with
//! [`super::Walk::take_errors`].

use std::path::PathBuf;
use thiserror::Error;

use crate::fs::FsError;
use crate::patterns::PatternError;

#[derive(Debug, Error)]
pub enum WalkError {
    /// File-system failure while inspecting or listing an entry
    #[error("{0}")]
    Fs(#[from] FsError),

    /// A segment on a calendar level does not parse as a date
    #[error("Invalid calendar segment '{}': {reason}", path.display())]
    InvalidCalendar { path: PathBuf, reason: String },

    /// A calendar segment parses but disagrees with its parents
    #[error("Inconsistent calendar segment '{}': {detail}", path.display())]
    CalendarMismatch { path: PathBuf, detail: String },

    /// `max_depth` is smaller than `min_depth`
    #[error("maxDepth {max} < minDepth {min}")]
    DepthBounds { min: usize, max: usize },

    /// A pattern of the condition failed to compile
    #[error("{0}")]
    Pattern(#[from] PatternError),
}
