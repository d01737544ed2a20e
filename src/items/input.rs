//! Scan roots and their item caches

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::extract::{
    ContentScanner, PathMarkers, extend_path_markers, parent_path_markers, resolve_markers,
};
use super::item::{Item, ItemTags, TagClosure};
use crate::fs::{Entry, EntryKind, FileSystem};
use crate::tags::{TagId, TagMarker, TagRegistry, extract_markers};
use crate::walk::{CalendarDate, PathCondition};

/// Outcome of one [`Input::scan`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub input: String,
    pub items: usize,
    /// The previous scan was still valid and was kept
    pub reused: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Default)]
struct InputState {
    /// Keyed by canonical path
    items: BTreeMap<PathBuf, Arc<Item>>,
    /// Every known path of an item, mapped to its canonical path
    aliases: HashMap<PathBuf, PathBuf>,
    /// Modification times of listed directories and of items
    stamps: Vec<(PathBuf, Option<SystemTime>)>,
    errors: Vec<String>,
    scanned: bool,
}

impl InputState {
    fn insert(&mut self, item: Item) {
        let canonical = item.canonical.clone();
        for path in &item.paths {
            self.aliases.insert(path.clone(), canonical.clone());
        }
        match self.items.get_mut(&canonical) {
            Some(existing) => Arc::make_mut(existing).paths.extend(item.paths),
            None => {
                self.items.insert(canonical, Arc::new(item));
            }
        }
    }

    fn remove_item(&mut self, canonical: &Path) {
        if let Some(item) = self.items.remove(canonical) {
            for p in &item.paths {
                self.aliases.remove(p);
            }
        }
    }

    fn remove_below(&mut self, path: &Path) -> usize {
        let doomed: Vec<PathBuf> = self
            .items
            .values()
            .filter(|item| item.paths.iter().any(|p| p.starts_with(path)))
            .map(|item| item.canonical.clone())
            .collect();
        for canonical in &doomed {
            self.remove_item(canonical);
        }
        doomed.len()
    }
}

/// One configured scan root
pub struct Input {
    name: String,
    root: PathBuf,
    condition: PathCondition,
    content_condition: Option<PathCondition>,
    tag: TagId,
    auto_tags: BTreeSet<TagId>,
    content: ContentScanner,
    state: RwLock<InputState>,
}

impl Input {
    /// `tag` is the input's own tag, a child of the `input` system tag.
    #[must_use]
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, condition: PathCondition, tag: TagId) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            condition,
            content_condition: None,
            tag,
            auto_tags: BTreeSet::new(),
            content: ContentScanner::default(),
            state: RwLock::new(InputState::default()),
        }
    }

    /// Only read the content of items that also satisfy `condition`.
    /// Without one, every item's content is read.
    #[must_use]
    pub fn with_content_condition(mut self, condition: PathCondition) -> Self {
        self.content_condition = Some(condition);
        self
    }

    #[must_use]
    pub fn with_auto_tags(mut self, tags: impl IntoIterator<Item = TagId>) -> Self {
        self.auto_tags.extend(tags);
        self
    }

    #[must_use]
    pub fn with_content_cache_capacity(mut self, capacity: u64) -> Self {
        self.content = ContentScanner::new(capacity);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn tag(&self) -> TagId {
        self.tag
    }

    #[must_use]
    pub const fn condition(&self) -> &PathCondition {
        &self.condition
    }

    /// Snapshot of the cached items, ordered by canonical path
    #[must_use]
    pub fn items(&self) -> Vec<Arc<Item>> {
        self.state.read().items.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-fatal errors of the last scan
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.state.read().errors.clone()
    }

    /// Look up the item denoted by `path`, which may be any of its paths.
    #[must_use]
    pub fn item_for(&self, fs: &dyn FileSystem, path: &Path) -> Option<Arc<Item>> {
        let state = self.state.read();
        let canonical = match state.aliases.get(path) {
            Some(canonical) => canonical.clone(),
            None => fs.canonicalize(path).ok()?,
        };
        state.items.get(&canonical).cloned()
    }

    /// Forget cached content of `path` so the next scan reads it again.
    pub fn invalidate_content(&self, path: &Path) {
        self.content.invalidate(path);
    }

    fn is_fresh(state: &InputState, fs: &dyn FileSystem) -> bool {
        state.stamps.iter().all(|(path, modified)| {
            fs.entry(path)
                .is_ok_and(|entry| entry.modified.is_some() && entry.modified == *modified)
        })
    }

    /// Scan the root, reusing the previous result unless `force` is set or
    /// a listed directory or an item changed since.
    pub fn scan(&self, fs: &dyn FileSystem, registry: &TagRegistry, force: bool) -> ScanReport {
        if !force {
            let state = self.state.read();
            if state.scanned && Self::is_fresh(&state, fs) {
                debug!(input = %self.name, items = state.items.len(), "scan cache still valid");
                return ScanReport {
                    input: self.name.clone(),
                    items: state.items.len(),
                    reused: true,
                    errors: state.errors.clone(),
                };
            }
        }

        info!(input = %self.name, root = %self.root.display(), "scanning");
        let mut next = InputState {
            scanned: true,
            ..InputState::default()
        };
        let mut errors = Vec::new();
        let mut walk = self.condition.walk(
            fs,
            &self.root,
            PathMarkers::default(),
            |parent: &PathMarkers, entry: &Entry, _| extend_path_markers(parent, entry),
        );
        for node in walk.by_ref() {
            let item = self.build_item(fs, registry, &node.entry, &node.parent_payload, node.date, &mut errors);
            next.insert(item);
        }
        errors.extend(walk.take_errors().iter().map(ToString::to_string));
        next.stamps = walk.visited_directories().to_vec();
        next.stamps
            .extend(next.items.values().map(|item| (item.path.clone(), item.modified)));
        next.errors = errors;

        let report = ScanReport {
            input: self.name.clone(),
            items: next.items.len(),
            reused: false,
            errors: next.errors.clone(),
        };
        info!(input = %self.name, items = report.items, errors = report.errors.len(), "scan finished");
        *self.state.write() = next;
        report
    }

    fn reads_content(&self, fs: &dyn FileSystem, path: &Path) -> bool {
        self.content_condition
            .as_ref()
            .is_none_or(|c| c.evaluate_path(fs, &self.root, path).is_some_and(|m| m.is_reported()))
    }

    fn build_item(
        &self,
        fs: &dyn FileSystem,
        registry: &TagRegistry,
        entry: &Entry,
        parent_markers: &[TagMarker],
        date: Option<CalendarDate>,
        errors: &mut Vec<String>,
    ) -> Item {
        let system = registry.system();
        let content_markers = if self.reads_content(fs, &entry.path) {
            self.content.markers(fs, entry).unwrap_or_else(|err| {
                errors.push(err.to_string());
                Arc::default()
            })
        } else {
            Arc::default()
        };
        let (content, content_implied) = resolve_markers(registry, &content_markers);
        let (name, name_implied) = resolve_markers(registry, &extract_markers(&entry.name()));
        let (parent, parent_implied) = resolve_markers(registry, parent_markers);

        let mut automatic = self.auto_tags.clone();
        automatic.insert(self.tag);
        automatic.insert(if entry.is_dir() { system.directory } else { system.file });
        if content.is_empty() && name.is_empty() && parent.is_empty() {
            automatic.insert(system.lost_and_found);
        }

        let tags = {
            let graph = registry.read();
            ItemTags::new(
                TagClosure::expand(&graph, &automatic, &BTreeSet::new()),
                TagClosure::expand(&graph, &content, &content_implied),
                TagClosure::expand(&graph, &name, &name_implied),
                TagClosure::expand(&graph, &parent, &parent_implied),
            )
        };
        let canonical = fs.canonicalize(&entry.path).unwrap_or_else(|_| entry.path.clone());
        let paths = BTreeSet::from([entry.path.clone(), canonical.clone()]);
        Item {
            path: entry.path.clone(),
            canonical,
            paths,
            kind: if entry.kind == EntryKind::Unknown { EntryKind::File } else { entry.kind },
            modified: entry.modified,
            date,
            input: self.name.clone(),
            tags,
        }
    }

    /// Apply a change notification for `path` without rescanning.
    ///
    /// A vanished path drops its item and everything below it. An existing
    /// entry is re-evaluated against the condition: its item is rebuilt, or
    /// dropped alone when it no longer qualifies. A changed directory also
    /// marks the cache stale, since children may have come or gone, so the
    /// next scan walks the tree again.
    ///
    /// Returns whether the item cache changed.
    pub fn add_path(&self, fs: &dyn FileSystem, registry: &TagRegistry, path: &Path) -> bool {
        let Ok(entry) = fs.entry(path) else {
            return self.remove_path(path);
        };
        let stale = entry.is_dir() && std::mem::take(&mut self.state.write().scanned);
        let matched = self
            .condition
            .evaluate_path(fs, &self.root, path)
            .filter(|m| m.is_reported());
        let Some(matched) = matched else {
            return self.remove_item_at(path) || stale;
        };
        self.content.invalidate(path);
        let mut errors = Vec::new();
        let parent = parent_path_markers(&self.root, path);
        let item = self.build_item(fs, registry, &entry, &parent, matched.date, &mut errors);
        debug!(input = %self.name, path = %path.display(), "item updated");
        let mut state = self.state.write();
        state.remove_item(&item.canonical);
        state.insert(item);
        state.errors.extend(errors);
        true
    }

    /// Drop the item denoted by `path`, keeping items below it.
    fn remove_item_at(&self, path: &Path) -> bool {
        let mut state = self.state.write();
        let Some(canonical) = state.aliases.get(path).cloned() else {
            return false;
        };
        state.remove_item(&canonical);
        debug!(input = %self.name, path = %path.display(), "item no longer qualifies");
        true
    }

    /// Drop the item at `path` and every item below it. Returns whether
    /// anything was removed.
    pub fn remove_path(&self, path: &Path) -> bool {
        let removed = self.state.write().remove_below(path);
        if removed > 0 {
            debug!(input = %self.name, path = %path.display(), removed, "items removed");
        }
        removed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FsError, LocalFs};
    use crate::tags::{TagParams, TagRegistryBuilder};
    use crate::testing::TreeFixture;
    use crate::walk::SimpleCondition;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts content reads on top of the local disk
    struct CountingFs {
        inner: LocalFs,
        reads: AtomicUsize,
    }

    impl CountingFs {
        fn new() -> Self {
            Self {
                inner: LocalFs::new(),
                reads: AtomicUsize::new(0),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl FileSystem for CountingFs {
        fn entry(&self, path: &Path) -> Result<Entry, FsError> {
            self.inner.entry(path)
        }
        fn list_children(&self, path: &Path) -> Result<Vec<PathBuf>, FsError> {
            self.inner.list_children(path)
        }
        fn read_text(&self, path: &Path) -> Result<String, FsError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_text(path)
        }
        fn set_text(&self, path: &Path, text: &str) -> Result<(), FsError> {
            self.inner.set_text(path, text)
        }
        fn move_entry(&self, from: &Path, to: &Path) -> Result<(), FsError> {
            self.inner.move_entry(from, to)
        }
        fn canonicalize(&self, path: &Path) -> Result<PathBuf, FsError> {
            self.inner.canonicalize(path)
        }
    }

    fn setup(fx: &TreeFixture) -> (TagRegistry, Input) {
        let builder = TagRegistryBuilder::new();
        let person = builder.declare("person", &TagParams::default()).unwrap();
        let me = builder.declare("me", &TagParams::default()).unwrap();
        builder.add_parent(me, person);
        let photos = builder.declare("photos", &TagParams::default()).unwrap();
        builder.add_parent(photos, builder.system().input);
        let (registry, errors) = builder.finish();
        assert!(errors.is_empty());
        let condition = PathCondition::simple(&SimpleCondition {
            min_depth: 1,
            max_depth: None,
            ..SimpleCondition::default()
        })
        .unwrap();
        (registry, Input::new("photos", fx.root(), condition, photos))
    }

    fn tag(registry: &TagRegistry, name: &str) -> TagId {
        registry.id(name).unwrap()
    }

    #[test]
    fn test_scan_extracts_tags_by_provenance() {
        let fx = TreeFixture::new()
            .file("trip #holiday/beach #me.txt", "with #person and https://x.org/#nope")
            .file("plain.txt", "nothing");
        let fs = LocalFs::new();
        let (registry, input) = setup(&fx);
        let report = input.scan(&fs, &registry, false);
        assert_eq!(report.items, 2);
        assert!(!report.reused);

        let beach = input.item_for(&fs, &fx.path("trip #holiday/beach #me.txt")).unwrap();
        assert!(beach.tags.name.own.contains(&tag(&registry, "me")));
        assert!(beach.tags.name.ancestors.contains(&tag(&registry, "person")));
        assert!(beach.tags.content.own.contains(&tag(&registry, "person")));
        assert_eq!(beach.tags.content.own.len(), 1);
        let holiday = tag(&registry, "holiday");
        assert!(beach.tags.parent_path.own.contains(&holiday));
        assert!(registry.read().ancestors(holiday).contains(&registry.system().unknown));
        assert!(beach.tags.automatic.own.contains(&registry.system().file));
        assert!(beach.tags.automatic.own.contains(&input.tag()));
        assert!(!beach.tags.automatic.own.contains(&registry.system().lost_and_found));

        let plain = input.item_for(&fs, &fx.path("plain.txt")).unwrap();
        assert!(plain.tags.automatic.own.contains(&registry.system().lost_and_found));
    }

    #[test]
    fn test_second_scan_reuses_cache_without_reading() {
        let fx = TreeFixture::new().file("a #x.txt", "#y").file("d/b.txt", "#z");
        let fs = CountingFs::new();
        let (registry, input) = setup(&fx);

        let first = input.scan(&fs, &registry, false);
        let reads = fs.reads();
        assert_eq!(reads, 2);
        let before = input.items();

        let second = input.scan(&fs, &registry, false);
        assert!(second.reused);
        assert_eq!(fs.reads(), reads);
        assert_eq!(second.items, first.items);
        assert_eq!(input.items(), before);
    }

    #[test]
    fn test_forced_scan_uses_content_cache() {
        let fx = TreeFixture::new().file("a.txt", "#y");
        let fs = CountingFs::new();
        let (registry, input) = setup(&fx);
        input.scan(&fs, &registry, false);
        let report = input.scan(&fs, &registry, true);
        assert!(!report.reused);
        assert_eq!(fs.reads(), 1);
    }

    #[test]
    fn test_new_file_invalidates_scan() {
        let fx = TreeFixture::new().file("a.txt", "");
        let fs = LocalFs::new();
        let (registry, input) = setup(&fx);
        input.scan(&fs, &registry, false);
        std::fs::remove_file(fx.path("a.txt")).unwrap();
        let report = input.scan(&fs, &registry, false);
        assert!(!report.reused);
        assert_eq!(report.items, 0);
    }

    #[test]
    fn test_descendant_marker_implies_subtree() {
        let fx = TreeFixture::new().file("group #@person.txt", "");
        let fs = LocalFs::new();
        let (registry, input) = setup(&fx);
        input.scan(&fs, &registry, false);
        let item = input.item_for(&fs, &fx.path("group #@person.txt")).unwrap();
        assert!(item.tags.name.descendants.contains(&tag(&registry, "me")));
    }

    #[test]
    fn test_add_and_remove_path() {
        let fx = TreeFixture::new().file("a.txt", "");
        let fs = LocalFs::new();
        let (registry, input) = setup(&fx);
        input.scan(&fs, &registry, false);

        std::fs::create_dir_all(fx.path("new #fresh")).unwrap();
        std::fs::write(fx.path("new #fresh/b.txt"), "#me").unwrap();
        assert!(input.add_path(&fs, &registry, &fx.path("new #fresh/b.txt")));
        let b = input.item_for(&fs, &fx.path("new #fresh/b.txt")).unwrap();
        assert!(b.tags.parent_path.own.contains(&tag(&registry, "fresh")));
        assert!(b.tags.content.own.contains(&tag(&registry, "me")));

        std::fs::remove_file(fx.path("a.txt")).unwrap();
        assert!(input.add_path(&fs, &registry, &fx.path("a.txt")));
        assert_eq!(input.len(), 1);
        assert!(!input.remove_path(&fx.path("missing.txt")));
    }

    #[test]
    fn test_changed_directory_keeps_items_below() {
        let fx = TreeFixture::new()
            .file("letter #me.txt", "")
            .file("sub/x #me.txt", "");
        let fs = LocalFs::new();
        let (registry, input) = setup(&fx);
        input.scan(&fs, &registry, false);
        assert_eq!(input.len(), 2);

        std::fs::write(fx.path("sub/y #me.txt"), "").unwrap();
        assert!(input.add_path(&fs, &registry, &fx.path("sub")));
        assert_eq!(input.len(), 2);

        let report = input.scan(&fs, &registry, false);
        assert!(!report.reused);
        assert_eq!(report.items, 3);
        assert!(input.item_for(&fs, &fx.path("sub/y #me.txt")).is_some());
    }

    #[test]
    fn test_vanished_directory_drops_items_below() {
        let fx = TreeFixture::new().file("a.txt", "").file("sub/x.txt", "").file("sub/y.txt", "");
        let fs = LocalFs::new();
        let (registry, input) = setup(&fx);
        input.scan(&fs, &registry, false);
        assert_eq!(input.len(), 3);

        std::fs::remove_dir_all(fx.path("sub")).unwrap();
        assert!(input.add_path(&fs, &registry, &fx.path("sub")));
        assert_eq!(input.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_paths_denote_one_item() {
        let fx = TreeFixture::new().file("real/a #me.txt", "");
        std::os::unix::fs::symlink(fx.path("real"), fx.path("link")).unwrap();
        let fs = LocalFs::new();
        let (registry, input) = setup(&fx);
        input.scan(&fs, &registry, false);

        let via_link = input.item_for(&fs, &fx.path("link/a #me.txt")).unwrap();
        let via_real = input.item_for(&fs, &fx.path("real/a #me.txt")).unwrap();
        assert_eq!(via_link.canonical, via_real.canonical);
        assert!(via_real.paths.len() >= 2);
    }
}
