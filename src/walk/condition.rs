//! Traversal conditions: levels, depth sugar and single-path evaluation

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use super::calendar::{self, CalendarDate};
use super::error::WalkError;
use super::{NodeKind, Walk};
use crate::fs::{Entry, EntryKind, FileSystem, entry_name};
use crate::patterns::{KindPatterns, MatchMode, PatternError, PatternKind};

/// One step of a bounded traversal
#[derive(Debug, Clone)]
pub struct Level {
    pub patterns: KindPatterns,
    /// Names entered without consuming this level
    pub transparent: BTreeSet<String>,
    /// Names skipped entirely at this level
    pub prune: BTreeSet<String>,
    pub ignore_non_directories: bool,
    /// Children must parse as calendar segments
    pub time: bool,
    /// Matches are reported, not only used to recurse further
    pub yields: bool,
    /// Report matching directories that are also descended into
    pub yield_containers: bool,
}

impl Default for Level {
    fn default() -> Self {
        Self {
            patterns: KindPatterns::default(),
            transparent: BTreeSet::new(),
            prune: BTreeSet::new(),
            ignore_non_directories: false,
            time: false,
            yields: true,
            yield_containers: false,
        }
    }
}

impl Level {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_patterns(mut self, patterns: KindPatterns) -> Self {
        self.patterns = patterns;
        self
    }

    #[must_use]
    pub fn with_transparent(mut self, name: impl Into<String>) -> Self {
        self.transparent.insert(name.into());
        self
    }

    #[must_use]
    pub fn with_prune(mut self, name: impl Into<String>) -> Self {
        self.prune.insert(name.into());
        self
    }

    #[must_use]
    pub const fn directories_only(mut self) -> Self {
        self.ignore_non_directories = true;
        self
    }

    #[must_use]
    pub const fn calendar(mut self) -> Self {
        self.time = true;
        self
    }

    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.yields = false;
        self
    }

    #[must_use]
    pub const fn yielding_containers(mut self) -> Self {
        self.yield_containers = true;
        self
    }
}

/// Depth-bounded sugar over identical levels
#[derive(Debug, Clone, Default)]
pub struct SimpleCondition {
    pub min_depth: usize,
    /// `None` means unbounded
    pub max_depth: Option<usize>,
    pub patterns: KindPatterns,
    pub transparent: BTreeSet<String>,
    pub prune: BTreeSet<String>,
    pub ignore_non_directories: bool,
    pub time: bool,
}

/// Where a single path landed when re-evaluated against a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathMatch {
    pub kind: NodeKind,
    pub level: usize,
    pub depth: usize,
    pub date: Option<CalendarDate>,
}

impl PathMatch {
    #[must_use]
    pub const fn is_reported(&self) -> bool {
        !matches!(self.kind, NodeKind::Internal)
    }
}

/// An ordered list of levels plus an optional repeating final level.
#[derive(Debug, Clone, Default)]
pub struct PathCondition {
    levels: Vec<Level>,
    final_level: Option<Level>,
    root_patterns: KindPatterns,
    prune_names: BTreeSet<String>,
    content_prune: Vec<Regex>,
    yield_root: bool,
}

impl PathCondition {
    /// Condition with explicitly specified levels
    #[must_use]
    pub fn new(levels: Vec<Level>) -> Self {
        Self {
            levels,
            ..Self::default()
        }
    }

    /// Expand `min_depth..=max_depth` into identical levels. Whitelists only
    /// apply to the first level.
    ///
    /// # Errors
    /// Returns `WalkError::DepthBounds` when `max_depth < min_depth`.
    pub fn simple(simple: &SimpleCondition) -> Result<Self, WalkError> {
        if let Some(max) = simple.max_depth
            && max < simple.min_depth
        {
            return Err(WalkError::DepthBounds {
                min: simple.min_depth,
                max,
            });
        }
        let make_level = |depth: usize| Level {
            patterns: if depth == 1 {
                simple.patterns.clone()
            } else {
                simple.patterns.without_whitelist()
            },
            transparent: simple.transparent.clone(),
            prune: simple.prune.clone(),
            ignore_non_directories: simple.ignore_non_directories,
            time: simple.time,
            yields: depth >= simple.min_depth,
            yield_containers: false,
        };
        let explicit = simple.max_depth.unwrap_or_else(|| simple.min_depth.max(1));
        let levels = (1..=explicit).map(make_level).collect();
        let final_level = simple.max_depth.is_none().then(|| make_level(explicit + 1));
        Ok(Self {
            levels,
            final_level,
            yield_root: simple.min_depth == 0,
            ..Self::default()
        })
    }

    /// Level applied after the explicit list is exhausted
    #[must_use]
    pub fn with_final_level(mut self, level: Level) -> Self {
        self.final_level = Some(level);
        self
    }

    /// Patterns the root itself must satisfy
    #[must_use]
    pub fn with_root_patterns(mut self, patterns: KindPatterns) -> Self {
        self.root_patterns = patterns;
        self
    }

    #[must_use]
    pub fn with_prune_name(mut self, name: impl Into<String>) -> Self {
        self.prune_names.insert(name.into());
        self
    }

    /// Skip every directory that has a child whose name matches `pattern`.
    ///
    /// # Errors
    /// Returns `WalkError::Pattern` when the regex does not compile.
    pub fn with_content_prune(mut self, pattern: &str) -> Result<Self, WalkError> {
        if pattern.is_empty() {
            return Err(PatternError::InvalidEmpty { kind: PatternKind::Regex }.into());
        }
        let compiled =
            Regex::new(pattern).map_err(|e| PatternError::regex_compile(pattern, &e.to_string()))?;
        self.content_prune.push(compiled);
        Ok(self)
    }

    /// Report the root itself as a match
    #[must_use]
    pub const fn yielding_root(mut self, yes: bool) -> Self {
        self.yield_root = yes;
        self
    }

    #[must_use]
    pub const fn yields_root(&self) -> bool {
        self.yield_root
    }

    /// Level used for children at `index` (0 = children of the root)
    #[must_use]
    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index).or(self.final_level.as_ref())
    }

    #[must_use]
    pub const fn root_patterns(&self) -> &KindPatterns {
        &self.root_patterns
    }

    pub(super) fn prunes(&self, level: &Level, name: &str) -> bool {
        self.prune_names.contains(name) || level.prune.contains(name)
    }

    pub(super) fn has_content_prune(&self) -> bool {
        !self.content_prune.is_empty()
    }

    pub(super) fn content_pruned(&self, children: &[PathBuf]) -> bool {
        self.has_content_prune()
            && children.iter().any(|child| {
                let name = entry_name(child);
                self.content_prune.iter().any(|re| re.is_match(&name))
            })
    }

    fn content_pruned_dir(&self, fs: &dyn FileSystem, dir: &Path) -> bool {
        self.has_content_prune()
            && fs
                .list_children(dir)
                .is_ok_and(|children| self.content_pruned(&children))
    }

    /// Lazily list everything under `root` that satisfies this condition.
    ///
    /// `create_payload(parent_payload, entry, level)` is called once for every
    /// node that is reported or descended into; its result is handed to the
    /// node's children as their parent payload.
    pub fn walk<'a, P, F>(
        &'a self,
        fs: &'a dyn FileSystem,
        root: impl Into<PathBuf>,
        root_payload: P,
        create_payload: F,
    ) -> Walk<'a, P, F>
    where
        P: Clone,
        F: FnMut(&P, &Entry, usize) -> P,
    {
        Walk::new(self, fs, root.into(), root_payload, create_payload)
    }

    /// Walk without payloads.
    pub fn walk_paths<'a>(
        &'a self,
        fs: &'a dyn FileSystem,
        root: impl Into<PathBuf>,
    ) -> Walk<'a, (), impl FnMut(&(), &Entry, usize)> {
        self.walk(fs, root, (), |_: &(), _: &Entry, _: usize| ())
    }

    /// Decide whether one specific path below `root` qualifies.
    ///
    /// Evaluation is optimistic: entries that cannot be inspected (for
    /// instance because they were just deleted) pass kind-dependent checks.
    #[must_use]
    pub fn evaluate_path(&self, fs: &dyn FileSystem, root: &Path, path: &Path) -> Option<PathMatch> {
        let rel = path.strip_prefix(root).ok()?;
        let kind_of = |p: &Path| fs.entry(p).map_or(EntryKind::Unknown, |e| e.kind);

        let root_kind = kind_of(root);
        if !self
            .root_patterns
            .evaluate(&entry_name(root), root, root_kind, MatchMode::Optimistic)
        {
            return None;
        }

        let components: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let Some(last) = components.len().checked_sub(1) else {
            if !self.yield_root {
                return None;
            }
            let kind = if root_kind == EntryKind::Directory && self.level(0).is_some() {
                NodeKind::External
            } else {
                NodeKind::Leaf
            };
            return Some(PathMatch {
                kind,
                level: 0,
                depth: 0,
                date: None,
            });
        };

        let mut current = root.to_path_buf();
        let mut level_index = 0;
        let mut date = None;
        for (i, name) in components.iter().enumerate() {
            if self.content_pruned_dir(fs, &current) {
                return None;
            }
            current.push(name);
            let level = self.level(level_index)?;
            if self.prunes(level, name) {
                return None;
            }
            let kind = kind_of(&current);
            if kind != EntryKind::File && level.transparent.contains(name) {
                if i == last {
                    return Some(PathMatch {
                        kind: NodeKind::Internal,
                        level: level_index,
                        depth: i + 1,
                        date,
                    });
                }
                continue;
            }
            if level.ignore_non_directories && kind == EntryKind::File {
                return None;
            }
            if level.time {
                match calendar::parse_segment(name, date, &current) {
                    Ok(parsed) => date = Some(parsed.date),
                    Err(err) => {
                        debug!("path {} rejected: {err}", path.display());
                        return None;
                    }
                }
            }
            let has_next = self.level(level_index + 1).is_some();
            if i < last {
                if !(has_next && level.patterns.admits_container(name, &current)) {
                    return None;
                }
                level_index += 1;
                continue;
            }

            if kind == EntryKind::Directory && self.content_pruned_dir(fs, &current) {
                return None;
            }
            let matched = level.yields
                && level
                    .patterns
                    .evaluate(name, &current, kind, MatchMode::Optimistic);
            let container = kind == EntryKind::Directory
                && has_next
                && level.patterns.admits_container(name, &current);
            let kind = match (container, matched) {
                (true, true) if level.yield_containers => NodeKind::External,
                (true, _) => NodeKind::Internal,
                (false, true) => NodeKind::Leaf,
                (false, false) => return None,
            };
            return Some(PathMatch {
                kind,
                level: level_index,
                depth: i + 1,
                date,
            });
        }
        None
    }
}
