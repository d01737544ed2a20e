//! Scanned items and their tag sets

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::fs::{EntryKind, entry_name};
use crate::tags::{TagGraph, TagId};
use crate::walk::CalendarDate;

/// Where an item's tag came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Assigned by the input (input tag, configured tags, file/directory)
    Automatic,
    /// Found in the file text or directory listing
    Content,
    /// Found in the entry's own name
    Name,
    /// Found in a directory name between the input root and the entry
    ParentPath,
}

impl Provenance {
    pub const ALL: [Self; 4] = [Self::Automatic, Self::Content, Self::Name, Self::ParentPath];
}

/// A set of tags together with its closures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagClosure {
    pub own: BTreeSet<TagId>,
    pub twins: BTreeSet<TagId>,
    pub ancestors: BTreeSet<TagId>,
    /// Only filled for tags written as `#@name`
    pub descendants: BTreeSet<TagId>,
}

impl TagClosure {
    /// Expand `own` with twins and ancestors, and the tags in `implied` with
    /// their descendants.
    #[must_use]
    pub fn expand(graph: &TagGraph, own: &BTreeSet<TagId>, implied: &BTreeSet<TagId>) -> Self {
        let mut closure = Self {
            own: own.clone(),
            ..Self::default()
        };
        for id in own {
            closure.twins.extend(graph.twins(*id));
            closure.ancestors.extend(graph.ancestors(*id));
        }
        for id in implied {
            closure.descendants.extend(graph.descendants(*id));
        }
        closure.twins.retain(|id| !own.contains(id));
        closure
    }

    pub fn merge(&mut self, other: &Self) {
        self.own.extend(&other.own);
        self.twins.extend(&other.twins);
        self.ancestors.extend(&other.ancestors);
        self.descendants.extend(&other.descendants);
        let own = &self.own;
        self.twins.retain(|id| !own.contains(id));
    }

    /// Union of every part
    #[must_use]
    pub fn all(&self) -> BTreeSet<TagId> {
        self.own
            .iter()
            .chain(&self.twins)
            .chain(&self.ancestors)
            .chain(&self.descendants)
            .copied()
            .collect()
    }

    #[must_use]
    pub fn contains(&self, id: TagId) -> bool {
        self.own.contains(&id)
            || self.twins.contains(&id)
            || self.ancestors.contains(&id)
            || self.descendants.contains(&id)
    }

    /// Tag is carried directly or through a twin
    #[must_use]
    pub fn carries(&self, id: TagId) -> bool {
        self.own.contains(&id) || self.twins.contains(&id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.own.is_empty()
    }
}

/// The four provenance sets of an item plus their union
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemTags {
    pub automatic: TagClosure,
    pub content: TagClosure,
    pub name: TagClosure,
    pub parent_path: TagClosure,
    pub all: TagClosure,
}

impl ItemTags {
    #[must_use]
    pub fn new(automatic: TagClosure, content: TagClosure, name: TagClosure, parent_path: TagClosure) -> Self {
        let mut all = TagClosure::default();
        for part in [&automatic, &content, &name, &parent_path] {
            all.merge(part);
        }
        Self {
            automatic,
            content,
            name,
            parent_path,
            all,
        }
    }

    #[must_use]
    pub const fn get(&self, provenance: Provenance) -> &TagClosure {
        match provenance {
            Provenance::Automatic => &self.automatic,
            Provenance::Content => &self.content,
            Provenance::Name => &self.name,
            Provenance::ParentPath => &self.parent_path,
        }
    }

    /// Every tag the item carries, in any closure
    #[must_use]
    pub fn all_tags(&self) -> BTreeSet<TagId> {
        self.all.all()
    }
}

/// One matched file-system entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Path the entry was found under
    pub path: PathBuf,
    /// Resolved path; the item's identity
    pub canonical: PathBuf,
    /// Every known path denoting the entry, `path` and `canonical` included
    pub paths: BTreeSet<PathBuf>,
    pub kind: EntryKind,
    pub modified: Option<SystemTime>,
    pub date: Option<CalendarDate>,
    /// Name of the input that produced the item
    pub input: String,
    pub tags: ItemTags,
}

impl Item {
    #[must_use]
    pub fn name(&self) -> String {
        entry_name(&self.path)
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    #[must_use]
    pub fn has_path(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}
