//! `FileSystem` backed by the local disk

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::{Entry, EntryKind, FileSystem, FsError, FsErrorKind};

/// Local file system restricted to a set of allowed roots.
///
/// With no roots configured every path is allowed.
#[derive(Debug, Clone, Default)]
pub struct LocalFs {
    roots: Vec<PathBuf>,
}

impl LocalFs {
    #[must_use]
    pub const fn new() -> Self {
        Self { roots: Vec::new() }
    }

    /// Only allow access below the given roots.
    #[must_use]
    pub fn with_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    fn check(&self, path: &Path) -> Result<(), FsError> {
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(FsError::new(FsErrorKind::NotAllowed, path));
        }
        if self.roots.is_empty() || self.roots.iter().any(|r| path.starts_with(r)) {
            Ok(())
        } else {
            Err(FsError::new(FsErrorKind::NotAllowed, path))
        }
    }
}

impl FileSystem for LocalFs {
    fn entry(&self, path: &Path) -> Result<Entry, FsError> {
        self.check(path)?;
        let meta = fs::metadata(path).map_err(|e| FsError::from_io(e, path))?;
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else if meta.is_file() {
            EntryKind::File
        } else {
            EntryKind::Unknown
        };
        Ok(Entry {
            path: path.to_path_buf(),
            kind,
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }

    fn list_children(&self, path: &Path) -> Result<Vec<PathBuf>, FsError> {
        self.check(path)?;
        let meta = fs::metadata(path).map_err(|e| FsError::from_io(e, path))?;
        if !meta.is_dir() {
            return Err(FsError::new(FsErrorKind::NotADirectory, path));
        }
        let mut children = Vec::new();
        for dirent in fs::read_dir(path).map_err(|e| FsError::from_io(e, path))? {
            let dirent = dirent.map_err(|e| FsError::from_io(e, path))?;
            children.push(dirent.path());
        }
        children.sort();
        Ok(children)
    }

    fn read_text(&self, path: &Path) -> Result<String, FsError> {
        self.check(path)?;
        let bytes = fs::read(path).map_err(|e| FsError::from_io(e, path))?;
        String::from_utf8(bytes).map_err(|_| FsError::new(FsErrorKind::NotText, path))
    }

    fn set_text(&self, path: &Path, text: &str) -> Result<(), FsError> {
        self.check(path)?;
        if !path.is_file() {
            let kind = if path.exists() {
                FsErrorKind::NotAFile
            } else {
                FsErrorKind::NotFound
            };
            return Err(FsError::new(kind, path));
        }
        fs::write(path, text).map_err(|e| FsError::from_io(e, path))
    }

    fn move_entry(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        self.check(from)?;
        self.check(to)?;
        if !from.exists() {
            return Err(FsError::new(FsErrorKind::NotFound, from));
        }
        if to.exists() {
            return Err(FsError::new(FsErrorKind::AlreadyExists, to));
        }
        fs::rename(from, to).map_err(|e| FsError::from_io(e, from))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, FsError> {
        self.check(path)?;
        fs::canonicalize(path).map_err(|e| FsError::from_io(e, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_and_listing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();

        let lfs = LocalFs::new();
        let children = lfs.list_children(dir.path()).unwrap();
        assert_eq!(children.len(), 2);
        assert!(lfs.entry(&dir.path().join("a")).unwrap().is_dir());
        assert_eq!(lfs.entry(&dir.path().join("b.txt")).unwrap().kind, EntryKind::File);
    }

    #[test]
    fn test_listing_a_file_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, "x").unwrap();
        let err = LocalFs::new().list_children(&file).unwrap_err();
        assert_eq!(err.kind, FsErrorKind::NotADirectory);
    }

    #[test]
    fn test_roots_restrict_access() {
        let allowed = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let lfs = LocalFs::with_roots([allowed.path()]);
        let err = lfs.entry(other.path()).unwrap_err();
        assert_eq!(err.kind, FsErrorKind::NotAllowed);
        assert!(lfs.entry(allowed.path()).is_ok());
    }

    #[test]
    fn test_move_refuses_existing_target() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();
        let err = LocalFs::new().move_entry(&a, &b).unwrap_err();
        assert_eq!(err.kind, FsErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");
    }

    #[test]
    fn test_directory_content_is_child_listing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x #cat.txt"), "").unwrap();
        fs::write(dir.path().join("y.txt"), "").unwrap();
        let lfs = LocalFs::new();
        let entry = lfs.entry(dir.path()).unwrap();
        let content = super::super::read_content(&lfs, &entry).unwrap();
        assert_eq!(content, "x #cat.txt\ny.txt");
    }
}
