//! Arena-backed tag graph
//!
//! Tags live in a slot vector and refer to each other through [`TagId`]
//! handles. Parent and child edges are stored on both ends and always kept
//! consistent. Twins (mutual aliases) share a group identifier; a group is
//! treated as a single node by every closure query.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::error::TagError;

/// Stable handle of a tag inside one [`TagGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(u32);

impl TagId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parameters of an explicit tag definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagParams {
    pub priority: u8,
    pub rename_allowed: bool,
    pub min_suggestion_len: usize,
    /// Configuration file the definition came from
    pub location: Option<PathBuf>,
}

impl Default for TagParams {
    fn default() -> Self {
        Self {
            priority: 0,
            rename_allowed: true,
            min_suggestion_len: 0,
            location: None,
        }
    }
}

impl TagParams {
    #[must_use]
    pub fn at(location: impl Into<PathBuf>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }
}

/// One node of the graph
#[derive(Debug, Clone)]
pub struct Tag {
    name: String,
    priority: u8,
    rename_allowed: bool,
    placeholder: bool,
    system: bool,
    min_suggestion_len: usize,
    parents: BTreeSet<TagId>,
    children: BTreeSet<TagId>,
    group: u32,
    locations: BTreeSet<PathBuf>,
    referenced_from: BTreeSet<PathBuf>,
}

impl Tag {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.priority
    }

    #[must_use]
    pub const fn rename_allowed(&self) -> bool {
        self.rename_allowed && !self.system
    }

    /// Referenced but not (yet) declared
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    #[must_use]
    pub const fn is_system(&self) -> bool {
        self.system
    }

    #[must_use]
    pub const fn min_suggestion_len(&self) -> usize {
        self.min_suggestion_len
    }

    /// Direct parents of this tag alone (not of its twins)
    #[must_use]
    pub const fn parents(&self) -> &BTreeSet<TagId> {
        &self.parents
    }

    #[must_use]
    pub const fn children(&self) -> &BTreeSet<TagId> {
        &self.children
    }

    /// Configuration files that declared this tag
    #[must_use]
    pub const fn locations(&self) -> &BTreeSet<PathBuf> {
        &self.locations
    }

    #[must_use]
    pub const fn referenced_from(&self) -> &BTreeSet<PathBuf> {
        &self.referenced_from
    }
}

/// Mutable tag graph, rebuilt for every configuration load
#[derive(Debug, Clone, Default)]
pub struct TagGraph {
    slots: Vec<Option<Tag>>,
    by_name: HashMap<String, TagId>,
    groups: HashMap<u32, BTreeSet<TagId>>,
    next_group: u32,
}

impl TagGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    #[must_use]
    pub fn id(&self, name: &str) -> Option<TagId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Name of a tag, or `""` for a stale handle
    #[must_use]
    pub fn name(&self, id: TagId) -> &str {
        self.get(id).map_or("", Tag::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagId, &Tag)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|tag| (TagId(i as u32), tag)))
    }

    /// Return the tag called `name`, creating it if needed.
    ///
    /// With `params` the call is a definition: the tag stops being a
    /// placeholder and the stricter of old and new parameters wins (rename
    /// permission can only be revoked, priority and suggestion length only
    /// raised). Without `params` a missing tag is created as a placeholder.
    pub fn get_or_create(&mut self, name: &str, params: Option<&TagParams>) -> TagId {
        if let Some(id) = self.id(name) {
            if let (Some(params), Some(tag)) = (params, self.get_mut(id)) {
                tag.placeholder = false;
                tag.rename_allowed &= params.rename_allowed;
                tag.priority = tag.priority.max(params.priority);
                tag.min_suggestion_len = tag.min_suggestion_len.max(params.min_suggestion_len);
                if let Some(location) = &params.location {
                    tag.locations.insert(location.clone());
                }
            }
            return id;
        }

        let id = TagId(self.slots.len() as u32);
        let group = self.next_group;
        self.next_group += 1;
        let defaults = TagParams::default();
        let p = params.unwrap_or(&defaults);
        self.slots.push(Some(Tag {
            name: name.to_string(),
            priority: p.priority,
            rename_allowed: p.rename_allowed,
            placeholder: params.is_none(),
            system: false,
            min_suggestion_len: p.min_suggestion_len,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
            group,
            locations: p.location.iter().cloned().collect(),
            referenced_from: BTreeSet::new(),
        }));
        self.by_name.insert(name.to_string(), id);
        self.groups.insert(group, BTreeSet::from([id]));
        id
    }

    /// Create an engine-defined tag that can never be renamed
    pub fn create_system(&mut self, name: &str) -> TagId {
        let id = self.get_or_create(
            name,
            Some(&TagParams {
                rename_allowed: false,
                ..TagParams::default()
            }),
        );
        if let Some(tag) = self.get_mut(id) {
            tag.system = true;
        }
        id
    }

    /// Remember that `from` refers to `id`
    pub fn note_reference(&mut self, id: TagId, from: &Path) {
        if let Some(tag) = self.get_mut(id) {
            tag.referenced_from.insert(from.to_path_buf());
        }
    }

    /// All members of `id`'s twin group, `id` included
    #[must_use]
    pub fn twin_group(&self, id: TagId) -> BTreeSet<TagId> {
        self.get(id)
            .and_then(|tag| self.groups.get(&tag.group))
            .cloned()
            .unwrap_or_default()
    }

    /// Twins of `id`, excluding `id` itself
    #[must_use]
    pub fn twins(&self, id: TagId) -> BTreeSet<TagId> {
        let mut group = self.twin_group(id);
        group.remove(&id);
        group
    }

    #[must_use]
    pub fn are_twins(&self, a: TagId, b: TagId) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(x), Some(y)) => x.group == y.group,
            _ => false,
        }
    }

    /// Direct parents of `id` and of its twins
    #[must_use]
    pub fn parents_of(&self, id: TagId) -> BTreeSet<TagId> {
        self.twin_group(id)
            .iter()
            .filter_map(|member| self.get(*member))
            .flat_map(|tag| tag.parents.iter().copied())
            .collect()
    }

    /// Direct children of `id` and of its twins
    #[must_use]
    pub fn children_of(&self, id: TagId) -> BTreeSet<TagId> {
        self.twin_group(id)
            .iter()
            .filter_map(|member| self.get(*member))
            .flat_map(|tag| tag.children.iter().copied())
            .collect()
    }

    #[must_use]
    pub fn is_root(&self, id: TagId) -> bool {
        self.parents_of(id).is_empty()
    }

    fn closure(&self, id: TagId, upward: bool) -> BTreeSet<TagId> {
        let own = self.twin_group(id);
        let mut seen = BTreeSet::new();
        let mut stack: Vec<TagId> = own.iter().copied().collect();
        while let Some(current) = stack.pop() {
            let next = if upward {
                self.parents_of(current)
            } else {
                self.children_of(current)
            };
            for n in next {
                for member in self.twin_group(n) {
                    if !own.contains(&member) && seen.insert(member) {
                        stack.push(member);
                    }
                }
            }
        }
        seen
    }

    /// Every tag reachable through parent edges (twins count as one node)
    #[must_use]
    pub fn ancestors(&self, id: TagId) -> BTreeSet<TagId> {
        self.closure(id, true)
    }

    /// Every tag reachable through child edges (twins count as one node)
    #[must_use]
    pub fn descendants(&self, id: TagId) -> BTreeSet<TagId> {
        self.closure(id, false)
    }

    /// Add `parent` as a parent of `tag`.
    ///
    /// # Errors
    /// Returns `TagError::ParentLoop` and leaves the graph unchanged when the
    /// edge would make `tag` its own ancestor.
    pub fn add_parent(&mut self, tag: TagId, parent: TagId) -> Result<(), TagError> {
        if self.get(tag).is_none() {
            return Err(TagError::Unknown(format!("#{}", tag.index())));
        }
        if self.get(parent).is_none() {
            return Err(TagError::Unknown(format!("#{}", parent.index())));
        }
        if self.are_twins(tag, parent) || self.descendants(tag).contains(&parent) {
            return Err(TagError::ParentLoop {
                tag: self.name(tag).to_string(),
                parent: self.name(parent).to_string(),
            });
        }
        if let Some(t) = self.get_mut(tag) {
            t.parents.insert(parent);
        }
        if let Some(p) = self.get_mut(parent) {
            p.children.insert(tag);
        }
        Ok(())
    }

    /// Make `a` and `b` twins, merging their groups.
    ///
    /// # Errors
    /// Returns `TagError::TwinLoop` when one is an ancestor of the other.
    pub fn set_twin(&mut self, a: TagId, b: TagId) -> Result<(), TagError> {
        let (Some(ta), Some(tb)) = (self.get(a), self.get(b)) else {
            return Err(TagError::Unknown(format!("#{}/#{}", a.index(), b.index())));
        };
        let (ga, gb) = (ta.group, tb.group);
        if ga == gb {
            return Ok(());
        }
        if self.ancestors(a).contains(&b) || self.descendants(a).contains(&b) {
            return Err(TagError::TwinLoop {
                a: self.name(a).to_string(),
                b: self.name(b).to_string(),
            });
        }
        let size = |g: u32| self.groups.get(&g).map_or(0, BTreeSet::len);
        let (keep, gone) = if size(ga) >= size(gb) { (ga, gb) } else { (gb, ga) };
        let moved = self.groups.remove(&gone).unwrap_or_default();
        for member in &moved {
            if let Some(tag) = self.get_mut(*member) {
                tag.group = keep;
            }
        }
        self.groups.entry(keep).or_default().extend(moved);
        Ok(())
    }

    /// Remove every descendant of `id` (not `id` itself) from the graph
    pub fn remove_descendants(&mut self, id: TagId) -> usize {
        let doomed = self.descendants(id);
        for gone in &doomed {
            let Some(tag) = self.slots.get_mut(gone.index()).and_then(Option::take) else {
                continue;
            };
            self.by_name.remove(&tag.name);
            if let Some(group) = self.groups.get_mut(&tag.group) {
                group.remove(gone);
                if group.is_empty() {
                    self.groups.remove(&tag.group);
                }
            }
            for parent in &tag.parents {
                if let Some(p) = self.get_mut(*parent) {
                    p.children.remove(gone);
                }
            }
            for child in &tag.children {
                if let Some(c) = self.get_mut(*child) {
                    c.parents.remove(gone);
                }
            }
        }
        doomed.len()
    }

    /// Placeholder tags, i.e. references that were never declared
    #[must_use]
    pub fn placeholders(&self) -> Vec<TagError> {
        self.iter()
            .filter(|(_, tag)| tag.placeholder)
            .map(|(_, tag)| TagError::Placeholder {
                name: tag.name.clone(),
                referenced_from: tag.referenced_from.iter().cloned().collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn define(g: &mut TagGraph, name: &str) -> TagId {
        g.get_or_create(name, Some(&TagParams::default()))
    }

    #[test]
    fn test_get_or_create_merges_stricter_parameters() {
        let mut g = TagGraph::new();
        let placeholder = g.get_or_create("person", None);
        assert!(g.get(placeholder).unwrap().is_placeholder());

        let id = g.get_or_create(
            "person",
            Some(&TagParams {
                priority: 2,
                rename_allowed: false,
                min_suggestion_len: 3,
                location: Some(PathBuf::from("/etc/a.toml")),
            }),
        );
        assert_eq!(id, placeholder);
        let again = g.get_or_create(
            "person",
            Some(&TagParams {
                priority: 1,
                rename_allowed: true,
                location: Some(PathBuf::from("/etc/b.toml")),
                ..TagParams::default()
            }),
        );
        assert_eq!(again, id);
        let tag = g.get(id).unwrap();
        assert!(!tag.is_placeholder());
        assert_eq!(tag.priority(), 2);
        assert!(!tag.rename_allowed());
        assert_eq!(tag.min_suggestion_len(), 3);
        assert_eq!(tag.locations().len(), 2);
    }

    #[test]
    fn test_parent_child_edges_are_consistent() {
        let mut g = TagGraph::new();
        let animal = define(&mut g, "animal");
        let dog = define(&mut g, "dog");
        g.add_parent(dog, animal).unwrap();
        assert!(g.get(animal).unwrap().children().contains(&dog));
        assert!(g.get(dog).unwrap().parents().contains(&animal));
        assert!(g.is_root(animal));
        assert!(!g.is_root(dog));
    }

    #[test]
    fn test_parent_loop_is_rejected_and_graph_unchanged() {
        let mut g = TagGraph::new();
        let a = define(&mut g, "a");
        let b = define(&mut g, "b");
        let c = define(&mut g, "c");
        g.add_parent(b, a).unwrap();
        g.add_parent(c, b).unwrap();

        let err = g.add_parent(a, c).unwrap_err();
        assert!(matches!(err, TagError::ParentLoop { .. }));
        assert!(g.ancestors(a).is_empty());
        assert!(g.get(c).unwrap().children().is_empty());
        assert!(matches!(g.add_parent(a, a), Err(TagError::ParentLoop { .. })));
    }

    #[test]
    fn test_closures_walk_through_twins() {
        let mut g = TagGraph::new();
        let person = define(&mut g, "person");
        let me = define(&mut g, "me");
        let franz = define(&mut g, "FranzMandl");
        let family = define(&mut g, "family");
        g.add_parent(franz, person).unwrap();
        g.add_parent(me, family).unwrap();
        g.set_twin(me, franz).unwrap();

        assert_eq!(g.twins(me), BTreeSet::from([franz]));
        assert_eq!(g.ancestors(me), BTreeSet::from([person, family]));
        assert_eq!(g.descendants(person), BTreeSet::from([franz, me]));
        assert_eq!(g.parents_of(franz), BTreeSet::from([person, family]));
    }

    #[test]
    fn test_twin_rings_are_transitive() {
        let mut g = TagGraph::new();
        let a = define(&mut g, "a");
        let b = define(&mut g, "b");
        let c = define(&mut g, "c");
        g.set_twin(a, b).unwrap();
        g.set_twin(c, b).unwrap();
        assert!(g.are_twins(a, c));
        assert_eq!(g.twin_group(c).len(), 3);
    }

    #[test]
    fn test_twin_of_ancestor_is_rejected() {
        let mut g = TagGraph::new();
        let a = define(&mut g, "a");
        let b = define(&mut g, "b");
        g.add_parent(b, a).unwrap();
        assert!(matches!(g.set_twin(a, b), Err(TagError::TwinLoop { .. })));
        assert!(!g.are_twins(a, b));
    }

    #[test]
    fn test_remove_descendants_detaches_edges() {
        let mut g = TagGraph::new();
        let unknown = g.create_system("unknown");
        let x = define(&mut g, "x");
        let keep = define(&mut g, "keep");
        g.add_parent(x, unknown).unwrap();
        assert_eq!(g.remove_descendants(unknown), 1);
        assert!(g.id("x").is_none());
        assert!(g.get(x).is_none());
        assert!(g.get(unknown).unwrap().children().is_empty());
        assert!(g.id("keep").is_some());
        assert_eq!(g.len(), 2);
        assert_eq!(g.name(keep), "keep");
    }

    #[test]
    fn test_system_tags_cannot_be_renamed() {
        let mut g = TagGraph::new();
        let id = g.create_system("lostAndFound");
        let tag = g.get(id).unwrap();
        assert!(tag.is_system());
        assert!(!tag.rename_allowed());
    }

    #[test]
    fn test_placeholders_name_their_references() {
        let mut g = TagGraph::new();
        let ghost = g.get_or_create("ghost", None);
        g.note_reference(ghost, Path::new("/cfg/main.toml"));
        let errors = g.placeholders();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("/cfg/main.toml"));
    }

    proptest! {
        #[test]
        fn prop_add_parent_never_creates_cycles(edges in proptest::collection::vec((0usize..8, 0usize..8), 0..40)) {
            let mut g = TagGraph::new();
            let ids: Vec<TagId> = (0..8).map(|i| define(&mut g, &format!("t{i}"))).collect();
            for (child, parent) in edges {
                let before = g.ancestors(ids[child]);
                let result = g.add_parent(ids[child], ids[parent]);
                if result.is_err() {
                    prop_assert_eq!(g.ancestors(ids[child]), before);
                }
            }
            for id in &ids {
                prop_assert!(!g.ancestors(*id).contains(id));
                prop_assert!(!g.descendants(*id).contains(id));
            }
        }
    }
}
