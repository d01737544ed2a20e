//! Facet generation
//!
//! The facets offered below a query path are the tags that still split the
//! matching items: the union of their tags minus the tags every one of them
//! carries, minus the tags the query already implies.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::ctx::{CHILD_MARKER, FilterCtx, PRIORITY_MARKER};
use crate::items::Item;
use crate::tags::{SystemTags, TagGraph, TagId};

/// One navigable tag below the current query path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub name: String,
    pub priority: u8,
    /// Direct child of the most recent tag in the query
    pub child_of_current: bool,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.child_of_current {
            write!(f, "{CHILD_MARKER}")?;
        }
        for _ in 0..self.priority {
            write!(f, "{PRIORITY_MARKER}")?;
        }
        f.write_str(&self.name)
    }
}

/// Tags already implied by the query: positive tags with their twins and
/// ancestors. A negated tag only takes its twins along; its ancestors may
/// still split the remaining items.
fn implied_by_query(graph: &TagGraph, ctx: &FilterCtx<'_>) -> BTreeSet<TagId> {
    let mut implied = BTreeSet::new();
    for tag in ctx.positive_tags() {
        implied.extend(graph.twin_group(*tag));
        implied.extend(graph.ancestors(*tag));
    }
    for tag in ctx.negated_tags() {
        implied.extend(graph.twin_group(tag));
    }
    implied
}

/// The `input` tag and the own tag of every input the items come from.
/// They stay offered even when every item carries them.
fn input_tags(graph: &TagGraph, items: &[Arc<Item>], union: &BTreeSet<TagId>) -> BTreeSet<TagId> {
    let mut kept: BTreeSet<TagId> = items
        .iter()
        .map(|item| item.input.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|name| graph.id(name))
        .filter(|id| union.contains(id))
        .collect();
    if !kept.is_empty() {
        kept.extend(graph.id(SystemTags::INPUT).filter(|id| union.contains(id)));
    }
    kept
}

/// Facets for the items that matched `ctx`.
///
/// In hierarchical mode a tag is only offered when it is a root tag, when
/// one of its parents is already implied, or when a parent that is not
/// itself offered has an implied parent (two levels, no further).
#[must_use]
pub fn facets(graph: &TagGraph, ctx: &FilterCtx<'_>, items: &[Arc<Item>], hierarchical: bool) -> Vec<Facet> {
    let mut sets = items.iter().map(|item| item.tags.all_tags());
    let Some(first) = sets.next() else {
        return Vec::new();
    };
    let (union, common) = sets.fold((first.clone(), first), |(mut union, common), set| {
        let common = common.intersection(&set).copied().collect();
        union.extend(set);
        (union, common)
    });

    let from_query = implied_by_query(graph, ctx);
    let inputs = input_tags(graph, items, &union);
    let candidates: BTreeSet<TagId> = union
        .iter()
        .copied()
        .filter(|id| (!common.contains(id) || inputs.contains(id)) && !from_query.contains(id))
        .filter(|id| {
            graph
                .get(*id)
                .is_some_and(|tag| tag.name().chars().count() >= tag.min_suggestion_len())
        })
        .collect();

    let implied: BTreeSet<TagId> = common.union(&from_query).copied().collect();
    let implied_parent = |id: TagId| graph.parents_of(id).iter().any(|p| implied.contains(p));
    let offered = |id: TagId| {
        if !hierarchical || graph.is_root(id) || implied_parent(id) {
            return true;
        }
        graph
            .parents_of(id)
            .iter()
            .any(|p| !candidates.contains(p) && !implied.contains(p) && implied_parent(*p))
    };

    let current_children = ctx
        .last_tag()
        .map(|tag| graph.children_of(tag))
        .unwrap_or_default();
    let mut facets: Vec<Facet> = candidates
        .iter()
        .copied()
        .filter(|id| offered(*id))
        .filter_map(|id| {
            let tag = graph.get(id)?;
            Some(Facet {
                name: tag.name().to_string(),
                priority: tag.priority(),
                child_of_current: current_children.contains(&id),
            })
        })
        .collect();
    facets.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    facets
}
