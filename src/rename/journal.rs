//! Reversible record of file-system mutations

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::fs::{FileSystem, FsError};

/// One applied change and what is needed to undo it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetText { path: PathBuf, previous: String },
    Move { from: PathBuf, to: PathBuf },
}

impl Mutation {
    /// Paths whose content or listing changed
    #[must_use]
    pub fn touched(&self) -> Vec<&Path> {
        match self {
            Self::SetText { path, .. } => vec![path.as_path()],
            Self::Move { from, to } => [from.as_path(), to.as_path()]
                .into_iter()
                .flat_map(|p| [Some(p), p.parent()])
                .flatten()
                .collect(),
        }
    }
}

/// Mutations applied so far, in order
#[derive(Debug, Default)]
pub struct Journal {
    applied: Vec<Mutation>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.applied
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Replace the text of `path`, remembering `previous` for the undo.
    ///
    /// # Errors
    /// Returns `FsError` when the file cannot be written.
    pub fn set_text(&mut self, fs: &dyn FileSystem, path: &Path, previous: String, text: &str) -> Result<(), FsError> {
        fs.set_text(path, text)?;
        info!(path = %path.display(), "rewrote content");
        self.applied.push(Mutation::SetText {
            path: path.to_path_buf(),
            previous,
        });
        Ok(())
    }

    /// # Errors
    /// Returns `FsError` when the move fails.
    pub fn move_entry(&mut self, fs: &dyn FileSystem, from: &Path, to: &Path) -> Result<(), FsError> {
        fs.move_entry(from, to)?;
        info!(from = %from.display(), to = %to.display(), "moved");
        self.applied.push(Mutation::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    /// Undo every mutation, newest first. Failures do not stop the
    /// reversion; they are returned as messages.
    pub fn revert(self, fs: &dyn FileSystem) -> Vec<String> {
        let mut failures = Vec::new();
        for mutation in self.applied.into_iter().rev() {
            let result = match &mutation {
                Mutation::SetText { path, previous } => fs.set_text(path, previous),
                Mutation::Move { from, to } => fs.move_entry(to, from),
            };
            match result {
                Ok(()) => info!(?mutation, "reverted"),
                Err(err) => {
                    warn!(?mutation, "revert failed: {err}");
                    failures.push(err.to_string());
                }
            }
        }
        failures
    }
}
