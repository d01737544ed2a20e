//! `TagTree`: one loaded configuration with its registry and inputs
//!
//! The facade owns everything derived from a configuration file. Loading
//! builds a fresh [`TagRegistry`] and one [`Input`] per `[[inputs]]` entry;
//! queries scan lazily and reuse earlier scans while the tree is unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::TagviewError;
use crate::config::{ConfigSource, FileConfigSource, InputDecl, Settings, TagDecl, VersionedConfig};
use crate::fs::{FileSystem, LocalFs};
use crate::items::{Input, Item, ScanReport};
use crate::query::{self, Listing, MatchScope, QueryOptions};
use crate::rename::{RenameSummary, TagTreeOperation};
use crate::tags::name::strip_marker;
use crate::tags::{TagError, TagId, TagParams, TagRegistry, TagRegistryBuilder};

/// One tag as shown by `tagview tags`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSummary {
    pub name: String,
    pub priority: u8,
    pub parents: Vec<String>,
    pub twins: Vec<String>,
    pub system: bool,
    pub placeholder: bool,
    pub rename_allowed: bool,
}

/// A loaded configuration
pub struct TagTree {
    config_path: PathBuf,
    source: Box<dyn ConfigSource>,
    fs: Arc<dyn FileSystem>,
    settings: Settings,
    files: Vec<PathBuf>,
    registry: TagRegistry,
    inputs: Vec<Input>,
    errors: Vec<String>,
}

impl std::fmt::Debug for TagTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagTree")
            .field("config_path", &self.config_path)
            .field("files", &self.files)
            .field("inputs", &self.inputs.len())
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}

/// Parse a `#name` reference, reporting it when malformed.
fn reference(builder: &TagRegistryBuilder, reference: &str, from: &Path) -> Option<TagId> {
    match strip_marker(reference) {
        Some(name) => builder.reference(name, from),
        None => {
            builder.report(TagError::InvalidName(reference.to_string()));
            None
        }
    }
}

fn declare_tag(builder: &TagRegistryBuilder, decl: &TagDecl) {
    let Some(name) = strip_marker(&decl.name) else {
        builder.report(TagError::InvalidName(decl.name.clone()));
        return;
    };
    let params = TagParams {
        priority: decl.priority,
        rename_allowed: decl.rename,
        min_suggestion_len: decl.min_suggestion_length,
        location: Some(decl.source.clone()),
    };
    let Some(id) = builder.declare(name, &params) else {
        return;
    };
    for parent in &decl.parents {
        if let Some(parent) = reference(builder, parent, &decl.source) {
            builder.add_parent(id, parent);
        }
    }
    for twin in &decl.twins {
        if let Some(twin) = reference(builder, twin, &decl.source) {
            builder.set_twin(id, twin);
        }
    }
}

fn build_input(builder: &TagRegistryBuilder, decl: &InputDecl, settings: &Settings) -> Result<Input, String> {
    let condition = decl.condition().map_err(|e| e.to_string())?;
    let content = decl.content_condition().map_err(|e| e.to_string())?;
    let params = TagParams {
        rename_allowed: false,
        ..TagParams::default()
    };
    let tag = builder
        .declare(&decl.name, &params)
        .ok_or_else(|| format!("Input name '{}' is not a valid tag name", decl.name))?;
    builder.add_parent(tag, builder.system().input);
    let auto_tags: Vec<TagId> = decl
        .tags
        .iter()
        .filter_map(|t| reference(builder, t, &decl.source))
        .collect();

    let mut input = Input::new(decl.name.clone(), decl.path.clone(), condition, tag)
        .with_auto_tags(auto_tags)
        .with_content_cache_capacity(settings.content_cache_capacity);
    if let Some(content) = content {
        input = input.with_content_condition(content);
    }
    Ok(input)
}

/// Registry and inputs of a resolved configuration plus every non-fatal
/// problem found while building them.
fn build(config: &VersionedConfig) -> (TagRegistry, Vec<Input>, Vec<String>) {
    let builder = TagRegistryBuilder::new();
    for decl in &config.tags {
        declare_tag(&builder, decl);
    }
    let built: Vec<Result<Input, String>> = config
        .inputs
        .par_iter()
        .map(|decl| build_input(&builder, decl, &config.settings))
        .collect();

    let mut errors = Vec::new();
    let mut inputs = Vec::with_capacity(built.len());
    for result in built {
        match result {
            Ok(input) => inputs.push(input),
            Err(err) => {
                warn!("skipping input: {err}");
                errors.push(err);
            }
        }
    }
    let (registry, tag_errors) = builder.finish();
    errors.extend(tag_errors.iter().map(ToString::to_string));
    (registry, inputs, errors)
}

impl TagTree {
    /// Load the configuration at `config_path` from disk.
    ///
    /// # Errors
    /// Returns `TagviewError::Config` if the configuration cannot be read.
    /// Problems inside a readable configuration are collected in
    /// [`TagTree::errors`] instead.
    pub fn load(config_path: impl Into<PathBuf>) -> Result<Self, TagviewError> {
        Self::with_parts(config_path, Box::new(FileConfigSource), Arc::new(LocalFs::new()))
    }

    /// # Errors
    /// Returns `TagviewError::Config` if the configuration cannot be resolved.
    pub fn with_parts(
        config_path: impl Into<PathBuf>,
        source: Box<dyn ConfigSource>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, TagviewError> {
        let config_path = config_path.into();
        let config = source.resolve(&config_path)?;
        let (registry, inputs, errors) = build(&config);
        info!(
            config = %config_path.display(),
            inputs = inputs.len(),
            errors = errors.len(),
            "tag tree loaded"
        );
        Ok(Self {
            config_path,
            source,
            fs,
            settings: config.settings,
            files: config.files,
            registry,
            inputs,
            errors,
        })
    }

    /// Re-read the configuration and rebuild registry and inputs. Earlier
    /// scans are discarded.
    ///
    /// # Errors
    /// Returns `TagviewError::Config` if the configuration cannot be read;
    /// the previous state is kept in that case.
    pub fn reload(&mut self) -> Result<(), TagviewError> {
        let config = self.source.resolve(&self.config_path)?;
        let (registry, inputs, errors) = build(&config);
        self.settings = config.settings;
        self.files = config.files;
        self.registry = registry;
        self.inputs = inputs;
        self.errors = errors;
        info!(config = %self.config_path.display(), "configuration reloaded");
        Ok(())
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Configuration files read by the last load
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[must_use]
    pub const fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    #[must_use]
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// Configuration problems of the last load
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Scan every input in parallel. A forced scan first forgets every tag
    /// filed below `unknown`, so names that disappeared from the tree stop
    /// being offered.
    pub fn rescan(&self, force: bool) -> Vec<ScanReport> {
        if force {
            self.registry.clear_unknown();
        }
        let fs = self.fs.as_ref();
        self.inputs
            .par_iter()
            .map(|input| input.scan(fs, &self.registry, force))
            .collect()
    }

    /// Every item of every input, scanning where needed
    #[must_use]
    pub fn items(&self) -> Vec<Arc<Item>> {
        self.rescan(false);
        self.inputs.iter().flat_map(Input::items).collect()
    }

    /// List a query path such as `/holiday/,not/me`.
    #[must_use]
    pub fn list(&self, query: &str) -> Listing {
        let options = QueryOptions {
            hierarchical: self.settings.hierarchical_facets,
        };
        self.list_with(query, options)
    }

    #[must_use]
    pub fn list_with(&self, query: &str, options: QueryOptions) -> Listing {
        let items = self.items();
        let graph = self.registry.read();
        let scope = MatchScope {
            graph: &graph,
            fs: self.fs.as_ref(),
        };
        query::list(&scope, &items, query, options)
    }

    /// Rename the tag at the end of `from` to the last segment of `to` and
    /// reload the configuration so the new name is live.
    ///
    /// # Errors
    /// Returns `TagviewError::Rename` when the rename is rejected or failed
    /// (and was rolled back), `TagviewError::Config` when the reload fails.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<RenameSummary, TagviewError> {
        self.rescan(false);
        let operation = TagTreeOperation::new(
            self.fs.as_ref(),
            &self.registry,
            &self.inputs,
            self.settings.max_rename_iterations,
        );
        let summary = operation.rename(from, to)?;
        self.reload()?;
        Ok(summary)
    }

    /// Apply a change notification for `path`. A changed configuration file
    /// triggers a reload; anything else updates the inputs containing it.
    ///
    /// Returns whether anything changed.
    ///
    /// # Errors
    /// Returns `TagviewError::Config` when a reload fails.
    pub fn apply_change(&mut self, path: &Path) -> Result<bool, TagviewError> {
        if self.files.iter().any(|f| f == path) {
            self.reload()?;
            return Ok(true);
        }
        let fs = self.fs.as_ref();
        let mut changed = false;
        for input in self.inputs.iter().filter(|i| path.starts_with(i.root())) {
            changed |= input.add_path(fs, &self.registry, path);
        }
        debug!(path = %path.display(), changed, "change applied");
        Ok(changed)
    }

    /// Every tag of the registry, sorted by name
    #[must_use]
    pub fn tags(&self) -> Vec<TagSummary> {
        let graph = self.registry.read();
        let names = |ids: &mut dyn Iterator<Item = TagId>| {
            let mut names: Vec<String> = ids.map(|id| graph.name(id).to_string()).collect();
            names.sort();
            names
        };
        let mut tags: Vec<TagSummary> = graph
            .iter()
            .map(|(id, tag)| TagSummary {
                name: tag.name().to_string(),
                priority: tag.priority(),
                parents: names(&mut tag.parents().iter().copied()),
                twins: names(&mut graph.twins(id).into_iter()),
                system: tag.is_system(),
                placeholder: tag.is_placeholder(),
                rename_allowed: tag.rename_allowed(),
            })
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TreeFixture;

    const CONFIG: &str = r##"
version = 2

[[tags]]
name = "#person"

[[tags]]
name = "#me"
parents = ["#person"]
twins = ["#FranzMandl"]

[[tags]]
name = "#FranzMandl"

[[tags]]
name = "#broken"
parents = ["#ghost", "person"]

[[tags]]
name = "#archive"
rename = false

[[inputs]]
name = "docs"
path = "docs"
tags = ["#archive"]
"##;

    fn tree() -> (TreeFixture, TagTree) {
        let fx = TreeFixture::new()
            .file("config.toml", CONFIG)
            .file("docs/letter #me.txt", "")
            .file("docs/notes.txt", "met #person");
        let tree = TagTree::load(fx.path("config.toml")).unwrap();
        (fx, tree)
    }

    #[test]
    fn test_load_collects_configuration_problems() {
        let (_fx, tree) = tree();
        assert_eq!(tree.inputs().len(), 1);
        assert!(tree.errors().iter().any(|e| e.contains("ghost")), "{:?}", tree.errors());
        assert!(tree.errors().iter().any(|e| e.contains("'person'")), "{:?}", tree.errors());
    }

    #[test]
    fn test_tag_summary() {
        let (_fx, tree) = tree();
        let tags = tree.tags();
        let me = tags.iter().find(|t| t.name == "me").unwrap();
        assert_eq!(me.parents, ["person"]);
        assert_eq!(me.twins, ["FranzMandl"]);
        let archive = tags.iter().find(|t| t.name == "archive").unwrap();
        assert!(!archive.rename_allowed);
        assert!(tags.iter().any(|t| t.name == "lostAndFound" && t.system));
    }

    #[test]
    fn test_list_scans_lazily() {
        let (_fx, tree) = tree();
        let listing = tree.list("/person/,evaluate");
        assert_eq!(listing.items.len(), 2);
        let reports = tree.rescan(false);
        assert!(reports.iter().all(|r| r.reused));
    }

    #[test]
    fn test_apply_change_updates_one_item() {
        let (fx, mut tree) = tree();
        assert_eq!(tree.list("/me/,evaluate").items.len(), 1);
        std::fs::write(fx.path("docs/notes.txt"), "with #me").unwrap();
        assert!(tree.apply_change(&fx.path("docs/notes.txt")).unwrap());
        assert_eq!(tree.inputs()[0].items().len(), 2);
        let graph = tree.registry().read();
        let me = graph.id("me").unwrap();
        let notes = tree.inputs()[0].item_for(&LocalFs::new(), &fx.path("docs/notes.txt")).unwrap();
        assert!(notes.tags.all.contains(me));
    }

    #[test]
    fn test_apply_change_on_directory_keeps_its_items() {
        let fx = TreeFixture::new()
            .file("config.toml", CONFIG)
            .file("docs/letter #me.txt", "")
            .file("docs/sub/x #me.txt", "");
        let mut tree = TagTree::load(fx.path("config.toml")).unwrap();
        assert_eq!(tree.list("/me/,evaluate").items.len(), 2);

        assert!(tree.apply_change(&fx.path("docs/sub")).unwrap());
        let reports = tree.rescan(false);
        assert!(reports.iter().all(|r| !r.reused));
        assert_eq!(tree.list("/me/,evaluate").items.len(), 2);
    }

    #[test]
    fn test_rename_reloads_configuration() {
        let (fx, mut tree) = tree();
        let summary = tree.rename("/person/me", "/person/myself").unwrap();
        assert_eq!(summary.config_files, 1);
        assert_eq!(summary.names, 1);
        assert!(fx.path("docs/letter #myself.txt").exists());
        assert!(tree.registry().id("myself").is_some());
        assert!(tree.registry().id("me").is_none());
        assert!(tree.rename("/archive", "/attic").is_err());
    }
}
