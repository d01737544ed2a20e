//! Tag extraction from names, parent paths and content

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use moka::sync::Cache;
use tracing::trace;

use crate::fs::{Entry, FileSystem, FsError, FsErrorKind, read_content};
use crate::tags::name::blank_urls;
use crate::tags::{TagId, TagMarker, TagRegistry, extract_markers};

/// Markers collected from the directory names between an input root and a
/// node; threaded down the walk as its payload.
pub type PathMarkers = Arc<Vec<TagMarker>>;

/// Payload of a child: the parent's markers plus the child's own.
#[must_use]
pub fn extend_path_markers(parent: &PathMarkers, entry: &Entry) -> PathMarkers {
    let own = extract_markers(&entry.name());
    if own.is_empty() {
        return Arc::clone(parent);
    }
    let mut markers = parent.as_ref().clone();
    markers.extend(own);
    Arc::new(markers)
}

/// Markers of every directory strictly between `root` and `path`
#[must_use]
pub fn parent_path_markers(root: &Path, path: &Path) -> Vec<TagMarker> {
    let Some(parent) = path.parent() else {
        return Vec::new();
    };
    let Ok(rel) = parent.strip_prefix(root) else {
        return Vec::new();
    };
    rel.components()
        .flat_map(|c| extract_markers(&c.as_os_str().to_string_lossy()))
        .collect()
}

/// Resolve markers to tag handles. Returns the tags and the subset written
/// as `#@name`.
pub fn resolve_markers(registry: &TagRegistry, markers: &[TagMarker]) -> (BTreeSet<TagId>, BTreeSet<TagId>) {
    let mut tags = BTreeSet::new();
    let mut implied = BTreeSet::new();
    for marker in markers {
        if let Some(id) = registry.resolve(&marker.name) {
            tags.insert(id);
            if marker.descendants {
                implied.insert(id);
            }
        }
    }
    (tags, implied)
}

#[derive(Debug, Clone)]
struct ContentStamp {
    modified: Option<SystemTime>,
    len: u64,
    markers: Arc<Vec<TagMarker>>,
}

/// Content marker extraction memoized per path and modification stamp
#[derive(Clone)]
pub struct ContentScanner {
    cache: Cache<PathBuf, ContentStamp>,
}

impl ContentScanner {
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Markers found in the entry's readable content, URLs blanked out.
    ///
    /// Files that are not text contribute no markers.
    ///
    /// # Errors
    /// Returns `FsError` when the content cannot be read.
    pub fn markers(&self, fs: &dyn FileSystem, entry: &Entry) -> Result<Arc<Vec<TagMarker>>, FsError> {
        if let Some(hit) = self.cache.get(&entry.path)
            && hit.modified.is_some()
            && hit.modified == entry.modified
            && hit.len == entry.len
        {
            return Ok(hit.markers);
        }
        trace!("reading content of {}", entry.path.display());
        let markers = match read_content(fs, entry) {
            Ok(text) => Arc::new(extract_markers(&blank_urls(&text))),
            Err(err) if err.kind == FsErrorKind::NotText => Arc::default(),
            Err(err) => return Err(err),
        };
        self.cache.insert(
            entry.path.clone(),
            ContentStamp {
                modified: entry.modified,
                len: entry.len,
                markers: Arc::clone(&markers),
            },
        );
        Ok(markers)
    }

    /// Forget what was read from `path`; used after rewriting it.
    pub fn invalidate(&self, path: &Path) {
        self.cache.invalidate(path);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for ContentScanner {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use crate::tags::TagRegistryBuilder;
    use crate::testing::TreeFixture;

    #[test]
    fn test_parent_path_markers_stop_at_root() {
        let root = Path::new("/data/#archive");
        let markers = parent_path_markers(root, Path::new("/data/#archive/trip #holiday/#@family/x #me.jpg"));
        let names: Vec<_> = markers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["holiday", "family"]);
        assert!(markers[1].descendants);
        assert!(parent_path_markers(root, Path::new("/elsewhere/a #b/c")).is_empty());
    }

    #[test]
    fn test_content_markers_are_cached() {
        let fx = TreeFixture::new().file("note.txt", "see http://x.org/#frag #beach");
        let fs = LocalFs::new();
        let scanner = ContentScanner::new(16);
        let entry = fs.entry(&fx.path("note.txt")).unwrap();

        let first = scanner.markers(&fs, &entry).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "beach");
        let second = scanner.markers(&fs, &entry).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        scanner.invalidate(&entry.path);
        let third = scanner.markers(&fs, &entry).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_directory_content_is_its_listing() {
        let fx = TreeFixture::new().file("album/#sunset.jpg", "").file("album/plain.jpg", "");
        let fs = LocalFs::new();
        let entry = fs.entry(&fx.path("album")).unwrap();
        let markers = ContentScanner::default().markers(&fs, &entry).unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].name, "sunset");
    }

    #[test]
    fn test_resolve_markers_creates_unknown_tags() {
        let (registry, _) = TagRegistryBuilder::new().finish();
        let markers = extract_markers("#a #@b");
        let (tags, implied) = resolve_markers(&registry, &markers);
        assert_eq!(tags.len(), 2);
        assert_eq!(implied, BTreeSet::from([registry.id("b").unwrap()]));
    }
}
