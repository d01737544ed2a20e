//! Tag rename
//!
//! Renaming a tag rewrites every place its `#name` marker is written:
//!
//! 1. the configuration files that declare or reference the tag
//! 2. the content of items carrying the tag through their content (file
//!    text, or the names of the children that hold the marker for
//!    directories)
//! 3. item names
//! 4. the nearest directory between input root and item whose name holds
//!    the marker
//!
//! Steps 2 to 4 are repeated until no item matches any more. Every change
//! is journaled and the whole rename is rolled back on the first failure.

pub mod error;
pub mod journal;

pub use error::RenameError;
pub use journal::{Journal, Mutation};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::fs::{FileSystem, entry_name};
use crate::items::{Input, Item};
use crate::query::{Filter, MatchScope, Reason, Relationship, select, strip_presentation, tokenize};
use crate::tags::name::{contains_marker, replace_content_marker, replace_marker};
use crate::tags::{TagId, TagRegistry, is_valid_tag_name};

/// What a successful rename changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameSummary {
    pub from: String,
    pub to: String,
    pub config_files: usize,
    pub contents: usize,
    pub names: usize,
    pub parent_paths: usize,
}

impl RenameSummary {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.config_files + self.contents + self.names + self.parent_paths
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Content,
    Name,
    ParentPath,
}

impl Step {
    const fn reason(self) -> Reason {
        match self {
            Self::Content => Reason::Content,
            Self::Name => Reason::Name,
            Self::ParentPath => Reason::ParentPath,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Name => "names",
            Self::ParentPath => "parent paths",
        }
    }
}

/// Split two facet paths into the renamed tag's old and new name.
///
/// # Errors
/// Returns `RenameError::NotASingleSegmentMove` unless both paths share
/// everything but a plain last tag segment.
pub fn split_rename<'a>(from: &'a str, to: &'a str) -> Result<(&'a str, &'a str), RenameError> {
    let reject = || RenameError::NotASingleSegmentMove {
        from: from.to_string(),
        to: to.to_string(),
    };
    let a = tokenize(from);
    let b = tokenize(to);
    let (Some((&old, prefix_a)), Some((&new, prefix_b))) = (a.split_last(), b.split_last()) else {
        return Err(reject());
    };
    if prefix_a != prefix_b || prefix_a.last().is_some_and(|t| t.is_empty()) || old.is_empty() || new.is_empty() {
        return Err(reject());
    }
    let (old, new) = (strip_presentation(old), strip_presentation(new));
    if old == new {
        return Err(reject());
    }
    Ok((old, new))
}

/// One rename of one tag across configuration files and inputs
pub struct TagTreeOperation<'a> {
    fs: &'a dyn FileSystem,
    registry: &'a TagRegistry,
    inputs: &'a [Input],
    max_iterations: usize,
    journal: Journal,
}

impl<'a> TagTreeOperation<'a> {
    #[must_use]
    pub fn new(fs: &'a dyn FileSystem, registry: &'a TagRegistry, inputs: &'a [Input], max_iterations: usize) -> Self {
        Self {
            fs,
            registry,
            inputs,
            max_iterations,
            journal: Journal::new(),
        }
    }

    fn validate(&self, old: &str, new: &str) -> Result<TagId, RenameError> {
        if !is_valid_tag_name(new) {
            return Err(RenameError::InvalidName(new.to_string()));
        }
        let graph = self.registry.read();
        let id = graph
            .id(old)
            .ok_or_else(|| RenameError::UnknownTag(old.to_string()))?;
        if !graph.get(id).is_some_and(|tag| tag.rename_allowed()) {
            return Err(RenameError::NotAllowed(old.to_string()));
        }
        if graph.id(new).is_some() {
            return Err(RenameError::AlreadyExists(new.to_string()));
        }
        Ok(id)
    }

    /// Rename the tag named by the last segment of `from` to the last
    /// segment of `to`.
    ///
    /// Nothing is touched when validation fails. Once mutation has started,
    /// any failure reverts every applied change; reversion failures are
    /// appended to the returned error.
    ///
    /// # Errors
    /// Returns `RenameError` describing the first failure.
    pub fn rename(mut self, from: &str, to: &str) -> Result<RenameSummary, RenameError> {
        let (old, new) = split_rename(from, to)?;
        let tag = self.validate(old, new)?;
        info!(old, new, "renaming tag");

        let mut summary = RenameSummary {
            from: old.to_string(),
            to: new.to_string(),
            ..RenameSummary::default()
        };
        match self.apply(tag, old, new, &mut summary) {
            Ok(()) => {
                info!(old, new, changes = summary.total(), "rename finished");
                Ok(summary)
            }
            Err(primary) => {
                warn!(old, new, "rename failed, reverting: {primary}");
                let journal = std::mem::take(&mut self.journal);
                let touched: Vec<PathBuf> = journal
                    .mutations()
                    .iter()
                    .flat_map(Mutation::touched)
                    .map(Path::to_path_buf)
                    .collect();
                let failures = journal.revert(self.fs);
                self.invalidate(&touched);
                // tags found in half-rewritten files must not outlive the rollback
                self.registry.clear_unknown();
                self.rescan();
                if failures.is_empty() {
                    Err(primary)
                } else {
                    Err(RenameError::RevertFailed {
                        primary: Box::new(primary),
                        failures,
                    })
                }
            }
        }
    }

    fn apply(&mut self, tag: TagId, old: &str, new: &str, summary: &mut RenameSummary) -> Result<(), RenameError> {
        summary.config_files = self.rewrite_config(tag, old, new)?;
        summary.contents = self.repeat(Step::Content, tag, old, new)?;
        summary.names = self.repeat(Step::Name, tag, old, new)?;
        summary.parent_paths = self.repeat(Step::ParentPath, tag, old, new)?;
        Ok(())
    }

    fn rewrite_config(&mut self, tag: TagId, old: &str, new: &str) -> Result<usize, RenameError> {
        let files: Vec<PathBuf> = {
            let graph = self.registry.read();
            graph
                .get(tag)
                .map(|t| t.locations().union(t.referenced_from()).cloned().collect())
                .unwrap_or_default()
        };
        let mut rewritten = 0;
        for file in files {
            let text = self.fs.read_text(&file)?;
            let (replaced, count) = replace_marker(&text, old, new);
            if count > 0 {
                self.journal.set_text(self.fs, &file, text, &replaced)?;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    fn matching(&self, step: Step, tag: TagId) -> Vec<Arc<Item>> {
        let graph = self.registry.read();
        let scope = MatchScope {
            graph: &graph,
            fs: self.fs,
        };
        let filter = [Filter::Tag {
            tag,
            reason: step.reason(),
            relationship: Relationship::Itself,
        }];
        self.inputs
            .iter()
            .flat_map(|input| select(&filter, &input.items(), &scope))
            .collect()
    }

    fn repeat(&mut self, step: Step, tag: TagId, old: &str, new: &str) -> Result<usize, RenameError> {
        let mut changed = 0;
        let mut previous: Option<usize> = None;
        for iteration in 0.. {
            let items = self.matching(step, tag);
            if items.is_empty() {
                return Ok(changed);
            }
            if previous.is_some_and(|p| items.len() >= p) {
                return Err(RenameError::LikelyInfiniteLoop {
                    step: step.label(),
                    remaining: items.len(),
                });
            }
            if iteration >= self.max_iterations {
                return Err(RenameError::TooManyIterations {
                    step: step.label(),
                    iterations: iteration,
                });
            }
            previous = Some(items.len());

            let before = self.journal.len();
            for item in &items {
                // an earlier move in this pass may have taken it along
                if self.fs.entry(&item.path).is_err() {
                    continue;
                }
                match step {
                    Step::Content => self.rewrite_content(item, old, new)?,
                    Step::Name => self.rewrite_name(item, old, new)?,
                    Step::ParentPath => self.rewrite_parent(item, old, new)?,
                }
                changed += 1;
            }
            let touched: Vec<PathBuf> = self.journal.mutations()[before..]
                .iter()
                .flat_map(Mutation::touched)
                .map(Path::to_path_buf)
                .collect();
            self.invalidate(&touched);
            self.rescan();
        }
        Ok(changed)
    }

    fn rewrite_content(&mut self, item: &Item, old: &str, new: &str) -> Result<(), RenameError> {
        if item.is_dir() {
            let children: Vec<PathBuf> = self
                .fs
                .list_children(&item.path)?
                .into_iter()
                .filter(|child| contains_marker(&entry_name(child), old))
                .collect();
            if children.is_empty() {
                return Err(not_found(old, &item.path));
            }
            for child in &children {
                self.rename_entry(child, old, new)?;
            }
            return Ok(());
        }
        let text = self.fs.read_text(&item.path)?;
        let (replaced, count) = replace_content_marker(&text, old, new);
        if count == 0 {
            return Err(not_found(old, &item.path));
        }
        self.journal.set_text(self.fs, &item.path, text, &replaced)?;
        Ok(())
    }

    fn rewrite_name(&mut self, item: &Item, old: &str, new: &str) -> Result<(), RenameError> {
        if !contains_marker(&item.name(), old) {
            return Err(not_found(old, &item.path));
        }
        self.rename_entry(&item.path, old, new)
    }

    fn rewrite_parent(&mut self, item: &Item, old: &str, new: &str) -> Result<(), RenameError> {
        let root = self
            .inputs
            .iter()
            .find(|input| input.name() == item.input)
            .map(|input| input.root().to_path_buf())
            .unwrap_or_default();
        let dir = item
            .path
            .ancestors()
            .skip(1)
            .take_while(|dir| *dir != root && dir.starts_with(&root))
            .find(|dir| contains_marker(&entry_name(dir), old))
            .map(Path::to_path_buf)
            .ok_or_else(|| not_found(old, &item.path))?;
        self.rename_entry(&dir, old, new)
    }

    fn rename_entry(&mut self, path: &Path, old: &str, new: &str) -> Result<(), RenameError> {
        let (name, _) = replace_marker(&entry_name(path), old, new);
        let target = path.with_file_name(name);
        self.journal.move_entry(self.fs, path, &target)?;
        Ok(())
    }

    fn invalidate(&self, paths: &[PathBuf]) {
        for input in self.inputs {
            for path in paths {
                input.invalidate_content(path);
            }
        }
    }

    fn rescan(&self) {
        let (fs, registry) = (self.fs, self.registry);
        self.inputs.par_iter().for_each(|input| {
            input.scan(fs, registry, true);
        });
    }
}

fn not_found(tag: &str, path: &Path) -> RenameError {
    RenameError::MarkerNotFound {
        tag: tag.to_string(),
        path: path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{Entry, FsError, FsErrorKind, LocalFs};
    use crate::tags::{TagParams, TagRegistryBuilder};
    use crate::testing::TreeFixture;
    use crate::walk::{PathCondition, SimpleCondition};

    /// Local disk that refuses to move one path
    struct RefusingFs {
        inner: LocalFs,
        refuse: PathBuf,
    }

    impl FileSystem for RefusingFs {
        fn entry(&self, path: &Path) -> Result<Entry, FsError> {
            self.inner.entry(path)
        }

        fn list_children(&self, path: &Path) -> Result<Vec<PathBuf>, FsError> {
            self.inner.list_children(path)
        }

        fn read_text(&self, path: &Path) -> Result<String, FsError> {
            self.inner.read_text(path)
        }

        fn set_text(&self, path: &Path, text: &str) -> Result<(), FsError> {
            self.inner.set_text(path, text)
        }

        fn move_entry(&self, from: &Path, to: &Path) -> Result<(), FsError> {
            if from == self.refuse {
                return Err(FsError::new(FsErrorKind::NotAllowed, from));
            }
            self.inner.move_entry(from, to)
        }

        fn canonicalize(&self, path: &Path) -> Result<PathBuf, FsError> {
            self.inner.canonicalize(path)
        }
    }

    fn setup(fx: &TreeFixture) -> (TagRegistry, Vec<Input>) {
        setup_with_depth(fx, None)
    }

    fn setup_with_depth(fx: &TreeFixture, max_depth: Option<usize>) -> (TagRegistry, Vec<Input>) {
        let builder = TagRegistryBuilder::new();
        let cfg = fx.path("config.toml");
        builder.declare("old", &TagParams::at(&cfg));
        builder.declare("locked", &TagParams {
            rename_allowed: false,
            ..TagParams::default()
        });
        let input_tag = builder.declare("docs", &TagParams::default()).unwrap();
        builder.add_parent(input_tag, builder.system().input);
        let (registry, _) = builder.finish();
        let condition = PathCondition::simple(&SimpleCondition {
            min_depth: 1,
            max_depth,
            ..SimpleCondition::default()
        })
        .unwrap();
        let input = Input::new("docs", fx.path("docs"), condition, input_tag);
        (registry, vec![input])
    }

    fn scan(fs: &LocalFs, registry: &TagRegistry, inputs: &[Input]) {
        for input in inputs {
            input.scan(fs, registry, true);
        }
    }

    #[test]
    fn test_split_rename() {
        assert_eq!(split_rename("/a/old", "/a/new").unwrap(), ("old", "new"));
        assert_eq!(split_rename("/a/'!old", "/a/new").unwrap(), ("old", "new"));
        assert!(split_rename("/a/old", "/b/new").is_err());
        assert!(split_rename("/a/old", "/a/new/x").is_err());
        assert!(split_rename("/,evaluate", "/,x").is_err());
        assert!(split_rename("/a/same", "/a/same").is_err());
    }

    #[test]
    fn test_preconditions_leave_everything_untouched() {
        let fx = TreeFixture::new()
            .file("config.toml", "name = \"#old\"")
            .file("docs/a #old.txt", "#old");
        let fs = LocalFs::new();
        let (registry, inputs) = setup(&fx);
        scan(&fs, &registry, &inputs);
        let op = || TagTreeOperation::new(&fs, &registry, &inputs, 100);

        assert!(matches!(op().rename("/old", "/bad name"), Err(RenameError::InvalidName(_))));
        assert!(matches!(op().rename("/ghost", "/new"), Err(RenameError::UnknownTag(_))));
        assert!(matches!(op().rename("/locked", "/new"), Err(RenameError::NotAllowed(_))));
        assert!(matches!(op().rename("/file", "/new"), Err(RenameError::NotAllowed(_))));
        assert!(matches!(op().rename("/old", "/docs"), Err(RenameError::AlreadyExists(_))));
        assert_eq!(fx.read("config.toml"), "name = \"#old\"");
        assert!(fx.path("docs/a #old.txt").exists());
    }

    #[test]
    fn test_rename_rewrites_every_occurrence() {
        let fx = TreeFixture::new()
            .file("config.toml", "[[tags]]\nname = \"#old\"\n")
            .file("docs/note.txt", "about #old and #oldish")
            .file("docs/a #old.txt", "")
            .file("docs/trip #old/deep/b.txt", "")
            .file("docs/album/x #old.jpg", "");
        let fs = LocalFs::new();
        let (registry, inputs) = setup(&fx);
        scan(&fs, &registry, &inputs);

        let summary = TagTreeOperation::new(&fs, &registry, &inputs, 100)
            .rename("/old", "/new")
            .unwrap();
        assert_eq!(summary.config_files, 1);
        assert!(summary.contents >= 1);
        assert_eq!(fx.read("config.toml"), "[[tags]]\nname = \"#new\"\n");
        assert_eq!(fx.read("docs/note.txt"), "about #new and #oldish");
        assert!(fx.path("docs/a #new.txt").exists());
        assert!(fx.path("docs/trip #new/deep/b.txt").exists());
        assert!(fx.path("docs/album/x #new.jpg").exists());
    }

    #[test]
    fn test_failure_rolls_back() {
        let fx = TreeFixture::new()
            .file("config.toml", "name = \"#old\"")
            .file("docs/a #old.txt", "")
            .file("docs/a #new.txt", "");
        let fs = LocalFs::new();
        let (registry, inputs) = setup(&fx);
        // declared tags only, so `new` is not known yet
        inputs[0].scan(&fs, &registry, true);
        registry.clear_unknown();

        let err = TagTreeOperation::new(&fs, &registry, &inputs, 100)
            .rename("/old", "/new")
            .unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");
        assert_eq!(fx.read("config.toml"), "name = \"#old\"");
        assert!(fx.path("docs/a #old.txt").exists());
    }

    #[test]
    fn test_leaf_directory_renames_every_marked_child() {
        let fx = TreeFixture::new()
            .file("config.toml", "name = \"#old\"")
            .file("docs/album/a #old.jpg", "")
            .file("docs/album/b #old.jpg", "")
            .file("docs/album/c.jpg", "");
        let fs = LocalFs::new();
        let (registry, inputs) = setup_with_depth(&fx, Some(1));
        scan(&fs, &registry, &inputs);

        let summary = TagTreeOperation::new(&fs, &registry, &inputs, 100)
            .rename("/old", "/new")
            .unwrap();
        assert_eq!(summary.contents, 1);
        assert!(fx.path("docs/album/a #new.jpg").exists());
        assert!(fx.path("docs/album/b #new.jpg").exists());
        assert!(fx.path("docs/album/c.jpg").exists());
        assert!(!fx.path("docs/album/a #old.jpg").exists());
    }

    #[test]
    fn test_rename_can_be_retried_after_rollback() {
        let fx = TreeFixture::new()
            .file("config.toml", "name = \"#old\"")
            .file("docs/note.txt", "#old")
            .file("docs/a #old.txt", "");
        let (registry, inputs) = setup(&fx);
        let refusing = RefusingFs {
            inner: LocalFs::new(),
            refuse: fx.path("docs/a #old.txt"),
        };
        scan(&refusing.inner, &registry, &inputs);

        let err = TagTreeOperation::new(&refusing, &registry, &inputs, 100)
            .rename("/old", "/new")
            .unwrap_err();
        assert!(err.to_string().contains("not allowed"), "{err}");
        assert_eq!(fx.read("docs/note.txt"), "#old");
        assert_eq!(fx.read("config.toml"), "name = \"#old\"");
        assert!(registry.id("new").is_none());

        let fs = LocalFs::new();
        TagTreeOperation::new(&fs, &registry, &inputs, 100)
            .rename("/old", "/new")
            .unwrap();
        assert_eq!(fx.read("docs/note.txt"), "#new");
        assert!(fx.path("docs/a #new.txt").exists());
    }
}
