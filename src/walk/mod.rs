//! Depth- and pattern-bounded tree traversal
//!
//! A [`PathCondition`] describes which descendants of a root are interesting:
//! one [`Level`] per directory step, an optional repeating final level, and
//! global prune rules. [`PathCondition::walk`] turns it into a lazy,
//! single-pass [`Walk`] iterator. The walk keeps one child iterator per open
//! directory on an explicit stack and emits nodes depth-first in pre-order;
//! dropping the iterator stops all further work.
//!
//! Three kinds of nodes are produced:
//! - [`NodeKind::Internal`]: a directory passed through on the way down,
//!   only reported when requested with [`Walk::with_internal_nodes`]
//! - [`NodeKind::External`]: a match that is also descended into
//! - [`NodeKind::Leaf`]: a match with nothing further to descend into
//!
//! Every directory is listed at most once per walk, keyed by its resolved
//! path, so symbolic links back into the tree cannot make it loop.

pub mod calendar;
pub mod condition;
pub mod error;

pub use calendar::CalendarDate;
pub use condition::{Level, PathCondition, PathMatch, SimpleCondition};
pub use error::WalkError;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::debug;

use crate::fs::{Entry, FileSystem, entry_name};
use crate::patterns::MatchMode;

/// Role of an emitted node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Internal,
    External,
    Leaf,
}

/// One visited entry
#[derive(Debug, Clone)]
pub struct WalkNode<P> {
    pub kind: NodeKind,
    pub entry: Entry,
    /// Physical depth below the root (root = 0)
    pub depth: usize,
    /// Index of the level the node was evaluated at
    pub level: usize,
    pub date: Option<CalendarDate>,
    pub payload: P,
    pub parent_payload: P,
}

struct Frame<P> {
    children: std::vec::IntoIter<PathBuf>,
    level: usize,
    depth: usize,
    date: Option<CalendarDate>,
    payload: P,
}

/// Lazy traversal produced by [`PathCondition::walk`]
pub struct Walk<'a, P, F> {
    condition: &'a PathCondition,
    fs: &'a dyn FileSystem,
    create_payload: F,
    root: Option<(PathBuf, P)>,
    stack: Vec<Frame<P>>,
    yield_internal: bool,
    errors: Vec<WalkError>,
    visited: Vec<(PathBuf, Option<SystemTime>)>,
    /// Resolved paths of the directories listed so far
    seen: HashSet<PathBuf>,
}

impl<'a, P, F> Walk<'a, P, F>
where
    P: Clone,
    F: FnMut(&P, &Entry, usize) -> P,
{
    pub(crate) fn new(
        condition: &'a PathCondition,
        fs: &'a dyn FileSystem,
        root: PathBuf,
        root_payload: P,
        create_payload: F,
    ) -> Self {
        Self {
            condition,
            fs,
            create_payload,
            root: Some((root, root_payload)),
            stack: Vec::new(),
            yield_internal: false,
            errors: Vec::new(),
            visited: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Also report pass-through directories
    #[must_use]
    pub const fn with_internal_nodes(mut self, yes: bool) -> Self {
        self.yield_internal = yes;
        self
    }

    /// Drain the non-fatal errors collected so far
    pub fn take_errors(&mut self) -> Vec<WalkError> {
        std::mem::take(&mut self.errors)
    }

    /// Directories listed so far, with their modification times
    #[must_use]
    pub fn visited_directories(&self) -> &[(PathBuf, Option<SystemTime>)] {
        &self.visited
    }

    fn list(&mut self, entry: &Entry) -> Option<Vec<PathBuf>> {
        let resolved = self
            .fs
            .canonicalize(&entry.path)
            .unwrap_or_else(|_| entry.path.clone());
        if !self.seen.insert(resolved) {
            debug!(path = %entry.path.display(), "directory already listed, skipping");
            return None;
        }
        match self.fs.list_children(&entry.path) {
            Ok(children) => {
                self.visited.push((entry.path.clone(), entry.modified));
                Some(children)
            }
            Err(err) => {
                self.errors.push(err.into());
                None
            }
        }
    }

    fn push(&mut self, children: Vec<PathBuf>, level: usize, depth: usize, date: Option<CalendarDate>, payload: P) {
        self.stack.push(Frame {
            children: children.into_iter(),
            level,
            depth,
            date,
            payload,
        });
    }

    fn start(&mut self, root: PathBuf, payload: P) -> Option<WalkNode<P>> {
        let entry = match self.fs.entry(&root) {
            Ok(entry) => entry,
            Err(err) => {
                self.errors.push(err.into());
                return None;
            }
        };
        let condition = self.condition;
        if !condition
            .root_patterns()
            .evaluate(&entry.name(), &entry.path, entry.kind, MatchMode::Pessimistic)
        {
            return None;
        }
        let mut descend = false;
        if entry.is_dir() {
            let children = self.list(&entry)?;
            if condition.content_pruned(&children) {
                return None;
            }
            if condition.level(0).is_some() {
                self.push(children, 0, 1, None, payload.clone());
                descend = true;
            }
        }
        condition.yields_root().then(|| WalkNode {
            kind: if descend { NodeKind::External } else { NodeKind::Leaf },
            entry,
            depth: 0,
            level: 0,
            date: None,
            payload: payload.clone(),
            parent_payload: payload,
        })
    }

    fn visit(
        &mut self,
        path: PathBuf,
        level_index: usize,
        depth: usize,
        parent_date: Option<CalendarDate>,
        parent_payload: P,
    ) -> Option<WalkNode<P>> {
        let condition = self.condition;
        let level = condition.level(level_index)?;
        let name = entry_name(&path);
        if condition.prunes(level, &name) {
            return None;
        }
        let entry = match self.fs.entry(&path) {
            Ok(entry) => entry,
            Err(err) => {
                // vanished between listing and inspection
                if !err.is_not_found() {
                    self.errors.push(err.into());
                }
                return None;
            }
        };

        if entry.is_dir() && level.transparent.contains(&name) {
            let children = self.list(&entry)?;
            if condition.content_pruned(&children) {
                return None;
            }
            let payload = (self.create_payload)(&parent_payload, &entry, level_index);
            self.push(children, level_index, depth + 1, parent_date, payload.clone());
            return self.yield_internal.then(|| WalkNode {
                kind: NodeKind::Internal,
                entry,
                depth,
                level: level_index,
                date: parent_date,
                payload,
                parent_payload,
            });
        }

        if level.ignore_non_directories && !entry.is_dir() {
            return None;
        }

        let mut date = parent_date;
        if level.time {
            match calendar::parse_segment(&name, parent_date, &entry.path) {
                Ok(parsed) => {
                    if let Some(detail) = parsed.mismatch {
                        self.errors.push(WalkError::CalendarMismatch {
                            path: entry.path.clone(),
                            detail,
                        });
                    }
                    date = Some(parsed.date);
                }
                Err(err) => {
                    self.errors.push(err);
                    return None;
                }
            }
        }

        let matched = level.yields
            && level
                .patterns
                .evaluate(&name, &entry.path, entry.kind, MatchMode::Pessimistic);
        let container = entry.is_dir()
            && condition.level(level_index + 1).is_some()
            && level.patterns.admits_container(&name, &entry.path);
        if !matched && !container {
            return None;
        }

        let children = if entry.is_dir() && (container || condition.has_content_prune()) {
            Some(self.list(&entry)?)
        } else {
            None
        };
        if let Some(children) = &children
            && condition.content_pruned(children)
        {
            return None;
        }

        let kind = match (container, matched) {
            (true, true) if level.yield_containers => NodeKind::External,
            (true, _) => NodeKind::Internal,
            (false, _) => NodeKind::Leaf,
        };
        let payload = (self.create_payload)(&parent_payload, &entry, level_index);
        if container && let Some(children) = children {
            self.push(children, level_index + 1, depth + 1, date, payload.clone());
        }
        if kind == NodeKind::Internal && !self.yield_internal {
            return None;
        }
        Some(WalkNode {
            kind,
            entry,
            depth,
            level: level_index,
            date,
            payload,
            parent_payload,
        })
    }
}

impl<P, F> Iterator for Walk<'_, P, F>
where
    P: Clone,
    F: FnMut(&P, &Entry, usize) -> P,
{
    type Item = WalkNode<P>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((root, payload)) = self.root.take()
            && let Some(node) = self.start(root, payload)
        {
            return Some(node);
        }
        while let Some(frame) = self.stack.last_mut() {
            let Some(child) = frame.children.next() else {
                self.stack.pop();
                continue;
            };
            let (level, depth, date, payload) = (frame.level, frame.depth, frame.date, frame.payload.clone());
            if let Some(node) = self.visit(child, level, depth, date, payload) {
                return Some(node);
            }
        }
        None
    }
}
