//! Query engine
//!
//! A query path is compiled by [`FilterCtx`] into a filter pipeline, which
//! is then applied to the scanned items. Without `evaluate` the result is
//! the next set of [`Facet`]s; with it, the matching item paths ordered by
//! [`rate_item`].
//!
//! # Examples
//!
//! ```text
//! /holiday                      facets below `holiday`
//! /holiday/,not/me              facets of holiday items without `me`
//! /person/,else/,evaluate       items tagged `person` itself, none of its children
//! /,reasonName/beach/,evaluate  items with `#beach` in their name
//! ```

pub mod ctx;
pub mod error;
pub mod facets;
pub mod filter;
pub mod rate;

pub use ctx::{FilterCtx, strip_presentation, tokenize};
pub use error::QueryError;
pub use facets::{Facet, facets};
pub use filter::{Filter, MatchScope, Reason, Relationship, StringMatcher, StringOperator, TimeOperator};
pub use rate::rate_item;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::items::Item;

/// Query behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Shape facets like the tag hierarchy
    pub hierarchical: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { hierarchical: true }
    }
}

/// Result of listing one query path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub facets: Vec<Facet>,
    /// Matching items, only filled once `evaluate` was seen
    pub items: Vec<PathBuf>,
    pub evaluated: bool,
    /// Whether the tag named by the last segment may be renamed
    pub rename_allowed: bool,
    /// Tag names to emphasize: the query's tags and their twins
    pub highlight: Vec<String>,
    pub errors: Vec<String>,
}

impl Listing {
    /// Facet segments or item paths, as a directory listing would show them
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        if self.evaluated {
            self.items.iter().map(|p| p.display().to_string()).collect()
        } else {
            self.facets.iter().map(ToString::to_string).collect()
        }
    }
}

/// Items passing every filter of the pipeline
#[must_use]
pub fn select(filters: &[Filter], items: &[Arc<Item>], scope: &MatchScope<'_>) -> Vec<Arc<Item>> {
    items
        .iter()
        .filter(|item| filters.iter().all(|f| f.matches(item, scope)))
        .cloned()
        .collect()
}

/// List `query` over `items`.
#[must_use]
pub fn list(scope: &MatchScope<'_>, items: &[Arc<Item>], query: &str, options: QueryOptions) -> Listing {
    let graph = scope.graph;
    let ctx = FilterCtx::parse(graph, query);
    let matched = select(ctx.filters(), items, scope);
    debug!(query, matched = matched.len(), of = items.len(), "query evaluated");

    let mut highlight: Vec<String> = ctx
        .positive_tags()
        .iter()
        .flat_map(|tag| graph.twin_group(*tag))
        .map(|id| graph.name(id).to_string())
        .collect();
    highlight.sort();
    highlight.dedup();

    let mut listing = Listing {
        evaluated: ctx.is_evaluate(),
        rename_allowed: ctx
            .last_tag()
            .and_then(|tag| graph.get(tag))
            .is_some_and(|tag| tag.rename_allowed()),
        highlight,
        errors: ctx.errors().iter().map(ToString::to_string).collect(),
        ..Listing::default()
    };
    if ctx.is_evaluate() {
        let mut rated: Vec<(u32, &Arc<Item>)> = matched
            .iter()
            .map(|item| (rate_item(graph, ctx.filters(), item), item))
            .collect();
        rated.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| a.path.cmp(&b.path)));
        listing.items = rated.into_iter().map(|(_, item)| item.path.clone()).collect();
    } else {
        listing.facets = facets(graph, &ctx, &matched, options.hierarchical);
    }
    listing
}
