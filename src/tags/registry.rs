//! Two-phase tag registry
//!
//! [`TagRegistryBuilder`] is used while configuration files are parsed:
//! several threads may declare and reference tags at once, and every problem
//! is recorded instead of aborting the load. [`TagRegistryBuilder::finish`]
//! turns it into a [`TagRegistry`], the read-mostly snapshot used by scans
//! and queries until the next configuration load.

use std::path::Path;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use super::error::TagError;
use super::graph::{TagGraph, TagId, TagParams};
use super::name::is_valid_tag_name;

/// Handles of the engine-defined tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemTags {
    pub directory: TagId,
    pub file: TagId,
    /// Parent of every input's own tag
    pub input: TagId,
    /// Parent of tags found in the tree but never declared
    pub unknown: TagId,
    /// Carried by items without any content, name or parent-path tag
    pub lost_and_found: TagId,
}

impl SystemTags {
    pub const INPUT: &'static str = "input";
    pub const NAMES: [&'static str; 5] = ["directory", "file", Self::INPUT, "unknown", "lostAndFound"];

    fn create(graph: &mut TagGraph) -> Self {
        Self {
            directory: graph.create_system("directory"),
            file: graph.create_system("file"),
            input: graph.create_system(Self::INPUT),
            unknown: graph.create_system("unknown"),
            lost_and_found: graph.create_system("lostAndFound"),
        }
    }
}

/// Registration phase
#[derive(Debug)]
pub struct TagRegistryBuilder {
    graph: Mutex<TagGraph>,
    system: SystemTags,
    errors: Mutex<Vec<TagError>>,
}

impl Default for TagRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TagRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut graph = TagGraph::new();
        let system = SystemTags::create(&mut graph);
        Self {
            graph: Mutex::new(graph),
            system,
            errors: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn system(&self) -> &SystemTags {
        &self.system
    }

    fn valid(&self, name: &str) -> bool {
        if is_valid_tag_name(name) {
            true
        } else {
            self.report(TagError::InvalidName(name.to_string()));
            false
        }
    }

    /// Define (or re-define) a tag.
    pub fn declare(&self, name: &str, params: &TagParams) -> Option<TagId> {
        self.valid(name)
            .then(|| self.graph.lock().get_or_create(name, Some(params)))
    }

    /// Refer to a tag that may be defined later.
    pub fn reference(&self, name: &str, from: &Path) -> Option<TagId> {
        if !self.valid(name) {
            return None;
        }
        let mut graph = self.graph.lock();
        let id = graph.get_or_create(name, None);
        graph.note_reference(id, from);
        Some(id)
    }

    /// Add a parent edge, recording a loop instead of applying it.
    pub fn add_parent(&self, tag: TagId, parent: TagId) -> bool {
        let result = self.graph.lock().add_parent(tag, parent);
        result.map_err(|err| self.report(err)).is_ok()
    }

    pub fn set_twin(&self, a: TagId, b: TagId) -> bool {
        let result = self.graph.lock().set_twin(a, b);
        result.map_err(|err| self.report(err)).is_ok()
    }

    pub fn report(&self, err: TagError) {
        warn!("tag configuration: {err}");
        self.errors.lock().push(err);
    }

    /// Enter the query phase, returning every problem found while registering
    /// plus one error per tag that is still a placeholder.
    #[must_use]
    pub fn finish(self) -> (TagRegistry, Vec<TagError>) {
        let registry = TagRegistry {
            graph: RwLock::new(self.graph.into_inner()),
            system: self.system,
        };
        let mut errors = self.errors.into_inner();
        errors.extend(registry.check());
        debug!("tag registry ready with {} tags", registry.read().len());
        (registry, errors)
    }
}

/// Query phase
#[derive(Debug)]
pub struct TagRegistry {
    graph: RwLock<TagGraph>,
    system: SystemTags,
}

impl TagRegistry {
    #[must_use]
    pub const fn system(&self) -> &SystemTags {
        &self.system
    }

    /// Shared access to the graph; do not hold it across calls that may
    /// create tags.
    pub fn read(&self) -> RwLockReadGuard<'_, TagGraph> {
        self.graph.read()
    }

    #[must_use]
    pub fn id(&self, name: &str) -> Option<TagId> {
        self.graph.read().id(name)
    }

    /// Look up a tag found in the tree, creating it below `unknown` when it
    /// was never declared. Returns `None` for names outside the grammar.
    pub fn resolve(&self, name: &str) -> Option<TagId> {
        if let Some(id) = self.id(name) {
            return Some(id);
        }
        if !is_valid_tag_name(name) {
            return None;
        }
        let mut graph = self.graph.write();
        // another scan may have created it in the meantime
        if let Some(id) = graph.id(name) {
            return Some(id);
        }
        let id = graph.get_or_create(name, Some(&TagParams::default()));
        if let Err(err) = graph.add_parent(id, self.system.unknown) {
            warn!("cannot file {name} under unknown: {err}");
        }
        debug!("created unknown tag {name}");
        Some(id)
    }

    /// Forget every tag created below `unknown`; done before a full rescan.
    pub fn clear_unknown(&self) -> usize {
        let removed = self.graph.write().remove_descendants(self.system.unknown);
        debug!("cleared {removed} unknown tags");
        removed
    }

    /// Tags that were referenced but never declared
    #[must_use]
    pub fn check(&self) -> Vec<TagError> {
        self.graph.read().placeholders()
    }
}
