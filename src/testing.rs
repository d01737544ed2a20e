//! Testing utilities for tagview
//!
//! Provides [`TreeFixture`], a temporary directory tree that is removed when
//! dropped, plus small helpers for reading fixture state back.
//!
//! Only available when compiled with `cfg(test)`.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Temporary directory tree built up file by file
///
/// # Examples
/// ```ignore
/// let fx = TreeFixture::new()
///     .file("photos/2021/beach #holiday.jpg", "")
///     .file("notes/todo.txt", "call #mom");
/// assert!(fx.path("notes/todo.txt").exists());
/// ```
pub struct TreeFixture {
    root: PathBuf,
    _dir: TempDir,
}

impl TreeFixture {
    /// # Panics
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create fixture directory");
        let root = fs::canonicalize(dir.path()).expect("Failed to canonicalize fixture root");
        Self { root, _dir: dir }
    }

    /// Create a file (and its parent directories) below the root
    ///
    /// # Panics
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn file(self, rel: impl AsRef<Path>, content: &str) -> Self {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture directories");
        }
        fs::write(&path, content).expect("Failed to write fixture file");
        self
    }

    /// Create an empty directory below the root
    ///
    /// # Panics
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn dir(self, rel: impl AsRef<Path>) -> Self {
        fs::create_dir_all(self.root.join(rel)).expect("Failed to create fixture directory");
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// # Panics
    /// Panics if the file cannot be read.
    #[must_use]
    pub fn read(&self, rel: impl AsRef<Path>) -> String {
        fs::read_to_string(self.path(rel)).expect("Failed to read fixture file")
    }
}

impl Default for TreeFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_nested_files() {
        let fx = TreeFixture::new().file("a/b/c.txt", "hello").dir("empty");
        assert_eq!(fx.read("a/b/c.txt"), "hello");
        assert!(fx.path("empty").is_dir());
    }

    #[test]
    fn test_fixture_cleanup() {
        let root = {
            let fx = TreeFixture::new().file("x.txt", "");
            fx.root().to_path_buf()
        };
        assert!(!root.exists());
    }
}
