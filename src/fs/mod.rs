//! Addressable file-system entries
//!
//! The engine never touches the disk directly. Traversal, scanning and the
//! rename workflow all go through the [`FileSystem`] trait so that
//! permission checks live in one place and tests can run against a
//! temporary directory.

pub mod error;
pub mod local;

pub use error::{FsError, FsErrorKind};
pub use local::LocalFs;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What kind of entry a path denotes, if known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    /// The entry could not be inspected (vanished, dangling link, ...)
    Unknown,
}

/// Snapshot of one file-system entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl Entry {
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    /// Final path component, lossily converted
    #[must_use]
    pub fn name(&self) -> String {
        entry_name(&self.path)
    }
}

/// Final component of `path` as a `String`, or the whole path for roots.
#[must_use]
pub fn entry_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned())
}

/// Permission-checked operations on addressable entries.
pub trait FileSystem: Send + Sync {
    /// Inspect a single entry.
    ///
    /// # Errors
    /// Returns `FsError` when the entry does not exist or may not be accessed.
    fn entry(&self, path: &Path) -> Result<Entry, FsError>;

    /// Full paths of the direct children of a directory, sorted by name.
    ///
    /// # Errors
    /// Returns `FsError` with `NotADirectory` when `path` is not a directory.
    fn list_children(&self, path: &Path) -> Result<Vec<PathBuf>, FsError>;

    /// # Errors
    /// Returns `FsError` when the file cannot be read or is not UTF-8 text.
    fn read_text(&self, path: &Path) -> Result<String, FsError>;

    /// Replace the content of an existing file.
    ///
    /// # Errors
    /// Returns `FsError` when the file cannot be written.
    fn set_text(&self, path: &Path, text: &str) -> Result<(), FsError>;

    /// Move (rename) an entry. The target must not exist.
    ///
    /// # Errors
    /// Returns `FsError` with `AlreadyExists` when `to` exists.
    fn move_entry(&self, from: &Path, to: &Path) -> Result<(), FsError>;

    /// Resolve symbolic links to the single path that identifies the entry.
    ///
    /// # Errors
    /// Returns `FsError` when the entry does not exist.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, FsError>;
}

/// Readable content of an entry: text for a file, the child-name listing
/// (one name per line) for a directory.
///
/// # Errors
/// Returns `FsError` from the underlying read or listing.
pub fn read_content(fs: &dyn FileSystem, entry: &Entry) -> Result<String, FsError> {
    match entry.kind {
        EntryKind::Directory => {
            let names: Vec<String> = fs
                .list_children(&entry.path)?
                .iter()
                .map(|p| entry_name(p))
                .collect();
            Ok(names.join("\n"))
        }
        EntryKind::File => fs.read_text(&entry.path),
        EntryKind::Unknown => Err(FsError::new(FsErrorKind::NotFound, &entry.path)),
    }
}
