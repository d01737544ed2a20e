//! Relevance rating of evaluated items

use super::filter::{Filter, Reason};
use crate::items::{Item, TagClosure};
use crate::tags::{TagGraph, TagId};

/// How closely an item's tags match a filter tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Other = 0,
    Grandchild = 1,
    Child = 2,
    Itself = 3,
}

fn category(graph: &TagGraph, closure: &TagClosure, tag: TagId) -> Category {
    if closure.carries(tag) {
        return Category::Itself;
    }
    let parents: Vec<TagId> = closure
        .own
        .iter()
        .flat_map(|own| graph.parents_of(*own))
        .collect();
    if parents.iter().any(|p| graph.are_twins(*p, tag)) {
        return Category::Child;
    }
    let grandchild = parents
        .iter()
        .flat_map(|p| graph.parents_of(*p))
        .any(|gp| graph.are_twins(gp, tag));
    if grandchild {
        Category::Grandchild
    } else {
        Category::Other
    }
}

/// Runs of consecutive tag filters sharing a reason, keeping the longest
/// run per reason.
fn longest_runs(filters: &[Filter]) -> Vec<(Reason, Vec<TagId>)> {
    fn close(run: Option<(Reason, Vec<TagId>)>, runs: &mut Vec<(Reason, Vec<TagId>)>) {
        let Some((reason, tags)) = run else {
            return;
        };
        match runs.iter_mut().find(|(r, _)| *r == reason) {
            Some(existing) if existing.1.len() < tags.len() => existing.1 = tags,
            Some(_) => {}
            None => runs.push((reason, tags)),
        }
    }

    let mut runs = Vec::new();
    let mut current: Option<(Reason, Vec<TagId>)> = None;
    for filter in filters {
        let Filter::Tag { tag, reason, .. } = filter else {
            close(current.take(), &mut runs);
            continue;
        };
        if let Some((r, tags)) = current.as_mut()
            && *r == *reason
        {
            tags.push(*tag);
            continue;
        }
        close(current.take(), &mut runs);
        current = Some((*reason, vec![*tag]));
    }
    close(current, &mut runs);
    runs
}

/// Score of `item` against the tag filters of a query: per reason, the best
/// category reached by any tag of its longest run, summed over reasons.
#[must_use]
pub fn rate_item(graph: &TagGraph, filters: &[Filter], item: &Item) -> u32 {
    longest_runs(filters)
        .iter()
        .map(|(reason, tags)| {
            let closure = reason.closure(&item.tags);
            tags.iter()
                .map(|tag| category(graph, closure, *tag) as u32)
                .max()
                .unwrap_or(0)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::EntryKind;
    use crate::query::filter::Relationship;
    use crate::items::ItemTags;
    use crate::tags::TagParams;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn item(graph: &TagGraph, name: &[TagId], content: &[TagId]) -> Item {
        let none = BTreeSet::new();
        let expand = |ids: &[TagId]| TagClosure::expand(graph, &ids.iter().copied().collect(), &none);
        Item {
            path: PathBuf::from("/x"),
            canonical: PathBuf::from("/x"),
            paths: BTreeSet::new(),
            kind: EntryKind::File,
            modified: None,
            date: None,
            input: "x".into(),
            tags: ItemTags::new(TagClosure::default(), expand(content), expand(name), TagClosure::default()),
        }
    }

    #[test]
    fn test_categories_by_distance() {
        let mut g = TagGraph::new();
        let mut def = |n: &str| g.get_or_create(n, Some(&TagParams::default()));
        let (place, beach, sand, other) = (def("place"), def("beach"), def("sand"), def("other"));
        g.add_parent(beach, place).unwrap();
        g.add_parent(sand, beach).unwrap();
        let it = item(&g, &[sand], &[]);

        let score = |tag| rate_item(&g, &[Filter::tag(tag)], &it);
        assert_eq!(score(sand), 3);
        assert_eq!(score(beach), 2);
        assert_eq!(score(place), 1);
        assert_eq!(score(other), 0);
    }

    #[test]
    fn test_runs_take_their_best_match_and_sum() {
        let mut g = TagGraph::new();
        let mut def = |n: &str| g.get_or_create(n, Some(&TagParams::default()));
        let (a, b, c) = (def("a"), def("b"), def("c"));
        let it = item(&g, &[a], &[c]);
        let name = |tag| Filter::Tag {
            tag,
            reason: Reason::Name,
            relationship: Relationship::Any,
        };
        let content = |tag| Filter::Tag {
            tag,
            reason: Reason::Content,
            relationship: Relationship::Any,
        };
        // name run [b, a] scores 3, content run [c] scores 3
        assert_eq!(rate_item(&g, &[name(b), name(a), content(c)], &it), 6);
        // the shorter name run is ignored
        assert_eq!(rate_item(&g, &[name(a), content(c), name(b), name(b)], &it), 3);
    }
}
