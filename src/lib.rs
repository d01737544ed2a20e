//! Tagview - a virtual, tag-indexed view over a real directory tree
//!
//! Files and directories carry tags through `#name` markers in their
//! content, their name or the names of the directories above them. This
//! library scans configured inputs, builds a tag graph with parents and
//! twins from a TOML configuration and answers faceted query paths such as
//! `/holiday/,not/me/,evaluate`. Renaming a tag rewrites every place its
//! marker is written.
//!
//! The [`engine::TagTree`] facade wires the parts together.

use thiserror::Error;

pub mod cli;
pub mod config;
pub mod engine;
pub mod fs;
pub mod items;
pub mod output;
pub mod patterns;
pub mod query;
pub mod rename;
pub mod tags;
pub mod walk;

pub use engine::TagTree;

#[cfg(test)]
pub mod testing;

/// Error enum, contains all failure states of the program
#[derive(Debug, Error)]
pub enum TagviewError {
    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    /// Rename rejected or rolled back
    #[error("Rename failed: {0}")]
    Rename(#[from] rename::RenameError),
    #[error("File system error: {0}")]
    Fs(#[from] fs::FsError),
    /// Represents an I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
