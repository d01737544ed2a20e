//! File-system collaborator errors
//!
//! Every operation on an addressable entry fails with a [`FsErrorKind`]
//! and the path it was attempted on. Callers surface the rendered message
//! verbatim and never retry.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Category of a failed file-system operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsErrorKind {
    NotFound,
    NotAllowed,
    AlreadyExists,
    NotADirectory,
    NotAFile,
    /// Content is not valid UTF-8 text
    NotText,
    Io,
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::NotAllowed => "not allowed",
            Self::AlreadyExists => "already exists",
            Self::NotADirectory => "not a directory",
            Self::NotAFile => "not a file",
            Self::NotText => "not a text file",
            Self::Io => "i/o failure",
        };
        f.write_str(s)
    }
}

/// Error returned by every [`super::FileSystem`] operation
#[derive(Debug, Error)]
#[error("{kind}: {}", path.display())]
pub struct FsError {
    pub kind: FsErrorKind,
    pub path: PathBuf,
    #[source]
    source: Option<io::Error>,
}

impl FsError {
    #[must_use]
    pub fn new(kind: FsErrorKind, path: impl AsRef<Path>) -> Self {
        Self {
            kind,
            path: path.as_ref().to_path_buf(),
            source: None,
        }
    }

    /// Classify an `io::Error` raised while touching `path`.
    #[must_use]
    pub fn from_io(err: io::Error, path: impl AsRef<Path>) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => FsErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => FsErrorKind::NotAllowed,
            io::ErrorKind::AlreadyExists => FsErrorKind::AlreadyExists,
            io::ErrorKind::NotADirectory => FsErrorKind::NotADirectory,
            io::ErrorKind::IsADirectory => FsErrorKind::NotAFile,
            io::ErrorKind::InvalidData => FsErrorKind::NotText,
            _ => FsErrorKind::Io,
        };
        Self {
            kind,
            path: path.as_ref().to_path_buf(),
            source: Some(err),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, FsErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_path() {
        let err = FsError::new(FsErrorKind::NotAllowed, "/srv/data/x.txt");
        assert_eq!(err.to_string(), "not allowed: /srv/data/x.txt");
    }

    #[test]
    fn test_io_classification() {
        let err = FsError::from_io(io::Error::from(io::ErrorKind::NotFound), "a");
        assert!(err.is_not_found());
        let err = FsError::from_io(io::Error::from(io::ErrorKind::PermissionDenied), "a");
        assert_eq!(err.kind, FsErrorKind::NotAllowed);
    }
}
