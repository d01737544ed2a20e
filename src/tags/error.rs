use std::path::PathBuf;
use thiserror::Error;

/// Tag graph and registry errors. All of them are configuration errors:
/// they are collected and reported, never fatal to a configuration load.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    /// Name violates the tag-name grammar
    #[error("Invalid tag name '{0}'")]
    InvalidName(String),

    /// Adding the edge would make a tag its own ancestor
    #[error("Parent loop: '{parent}' is already a descendant of '{tag}'")]
    ParentLoop { tag: String, parent: String },

    /// Twins may not be related by ancestry
    #[error("Twin loop: '{a}' and '{b}' are ancestor and descendant")]
    TwinLoop { a: String, b: String },

    /// Referenced as a parent/twin/input tag but never declared
    #[error("Tag '{name}' is referenced but never defined (referenced from {})", format_locations(.referenced_from))]
    Placeholder {
        name: String,
        referenced_from: Vec<PathBuf>,
    },

    /// Lookup of a name that does not exist
    #[error("Unknown tag '{0}'")]
    Unknown(String),
}

fn format_locations(locations: &[PathBuf]) -> String {
    if locations.is_empty() {
        return "nowhere".to_string();
    }
    locations
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
