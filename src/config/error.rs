//! Configuration loading errors
//!
//! Only problems that make a configuration file unusable as a whole are
//! errors here. Mistakes inside an otherwise readable file (bad tag names,
//! parent loops, placeholders) are collected by the tag registry instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform has no configuration directory
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read or deserialized
    #[error("Failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ::config::ConfigError,
    },

    #[error("Unsupported configuration version {version} in {}", path.display())]
    UnsupportedVersion { version: u32, path: PathBuf },

    /// A file includes itself, directly or through other files
    #[error("Include cycle through {}", .0.display())]
    IncludeCycle(PathBuf),

    /// An input that cannot be turned into a traversal condition
    #[error("Invalid input '{name}': {reason}")]
    InvalidInput { name: String, reason: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
