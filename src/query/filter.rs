//! Filter pipeline elements

use std::fmt;

use regex::Regex;

use super::error::QueryError;
use crate::fs::{FileSystem, read_content};
use crate::items::{Item, ItemTags, TagClosure};
use crate::tags::{TagGraph, TagId};
use crate::walk::CalendarDate;

/// Which of an item's tag sets a tag filter looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Reason {
    #[default]
    Any,
    Automatic,
    Content,
    Name,
    ParentPath,
}

impl Reason {
    #[must_use]
    pub const fn closure(self, tags: &ItemTags) -> &TagClosure {
        match self {
            Self::Any => &tags.all,
            Self::Automatic => &tags.automatic,
            Self::Content => &tags.content,
            Self::Name => &tags.name,
            Self::ParentPath => &tags.parent_path,
        }
    }
}

impl TryFrom<&str> for Reason {
    type Error = QueryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "automatic" => Ok(Self::Automatic),
            "content" => Ok(Self::Content),
            "name" => Ok(Self::Name),
            "parentpath" => Ok(Self::ParentPath),
            _ => Err(QueryError::IllegalOperator(format!("reason{value}"))),
        }
    }
}

/// Which closure of the selected tag set a tag filter looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Relationship {
    #[default]
    Any,
    /// The tag itself
    Itself,
    /// The item carries a descendant of the tag
    Ancestor,
    /// The tag is implied through a `#@` marker on one of its ancestors
    Descendant,
    Twin,
}

impl Relationship {
    #[must_use]
    pub fn holds(self, closure: &TagClosure, tag: TagId) -> bool {
        match self {
            Self::Any => closure.contains(tag),
            Self::Itself => closure.own.contains(&tag),
            Self::Ancestor => closure.ancestors.contains(&tag),
            Self::Descendant => closure.descendants.contains(&tag),
            Self::Twin => closure.twins.contains(&tag),
        }
    }
}

impl TryFrom<&str> for Relationship {
    type Error = QueryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "self" => Ok(Self::Itself),
            "ancestor" => Ok(Self::Ancestor),
            "descendant" => Ok(Self::Descendant),
            "twin" => Ok(Self::Twin),
            _ => Err(QueryError::IllegalOperator(format!("relationship{value}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOperator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    Regex,
}

impl TryFrom<&str> for StringOperator {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "equals" => Ok(Self::Equals),
            "startswith" => Ok(Self::StartsWith),
            "endswith" => Ok(Self::EndsWith),
            "regex" => Ok(Self::Regex),
            _ => Err(()),
        }
    }
}

/// A string operator with its value, regexes compiled once
#[derive(Debug, Clone)]
pub struct StringMatcher {
    pub operator: StringOperator,
    pub value: String,
    regex: Option<Regex>,
}

impl StringMatcher {
    /// # Errors
    /// Returns `QueryError::InvalidValue` for a regex that does not compile.
    pub fn new(operator: StringOperator, value: &str) -> Result<Self, QueryError> {
        let regex = match operator {
            StringOperator::Regex => Some(Regex::new(value).map_err(|e| QueryError::InvalidValue {
                operator: "regex".to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            })?),
            _ => None,
        };
        Ok(Self {
            operator,
            value: value.to_string(),
            regex,
        })
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        match self.operator {
            StringOperator::Contains => text.contains(&self.value),
            StringOperator::Equals => text == self.value,
            StringOperator::StartsWith => text.starts_with(&self.value),
            StringOperator::EndsWith => text.ends_with(&self.value),
            StringOperator::Regex => self.regex.as_ref().is_some_and(|r| r.is_match(text)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOperator {
    Before,
    After,
    On,
}

impl TryFrom<&str> for TimeOperator {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            "on" => Ok(Self::On),
            _ => Err(()),
        }
    }
}

impl TimeOperator {
    /// Compare the day ranges covered by two dates of any precision.
    /// `On` holds when the ranges overlap.
    #[must_use]
    pub fn holds(self, item: CalendarDate, filter: CalendarDate) -> bool {
        let (Some(item_first), Some(item_last), Some(first), Some(last)) = (
            item.to_naive(),
            item.last_naive(),
            filter.to_naive(),
            filter.last_naive(),
        ) else {
            return false;
        };
        match self {
            Self::Before => item_last < first,
            Self::After => item_first > last,
            Self::On => item_first <= last && first <= item_last,
        }
    }
}

/// Everything a filter may consult besides the item
#[derive(Clone, Copy)]
pub struct MatchScope<'a> {
    pub graph: &'a TagGraph,
    pub fs: &'a dyn FileSystem,
}

/// One element of the filter pipeline
#[derive(Debug, Clone)]
pub enum Filter {
    Tag {
        tag: TagId,
        reason: Reason,
        relationship: Relationship,
    },
    Not(Box<Filter>),
    /// Drops items that carry a strict descendant of the tag
    Else(TagId),
    Content(StringMatcher),
    Path(StringMatcher),
    Time {
        date: CalendarDate,
        operator: TimeOperator,
    },
}

impl Filter {
    /// Plain tag filter on every provenance and closure
    #[must_use]
    pub const fn tag(tag: TagId) -> Self {
        Self::Tag {
            tag,
            reason: Reason::Any,
            relationship: Relationship::Any,
        }
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    #[must_use]
    pub fn matches(&self, item: &Item, scope: &MatchScope<'_>) -> bool {
        match self {
            Self::Tag {
                tag,
                reason,
                relationship,
            } => relationship.holds(reason.closure(&item.tags), *tag),
            Self::Not(inner) => !inner.matches(item, scope),
            Self::Else(tag) => {
                let descendants = scope.graph.descendants(*tag);
                let all = &item.tags.all;
                !all.own.iter().chain(&all.twins).any(|t| descendants.contains(t))
            }
            Self::Content(matcher) => scope
                .fs
                .entry(&item.path)
                .and_then(|entry| read_content(scope.fs, &entry))
                .is_ok_and(|text| matcher.is_match(&text)),
            Self::Path(matcher) => matcher.is_match(&item.path.to_string_lossy()),
            Self::Time { date, operator } => item.date.is_some_and(|d| operator.holds(d, *date)),
        }
    }

    /// Tag named by this filter, looking through `Not`
    #[must_use]
    pub fn tag_id(&self) -> Option<TagId> {
        match self {
            Self::Tag { tag, .. } | Self::Else(tag) => Some(*tag),
            Self::Not(inner) => inner.tag_id(),
            _ => None,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Any => "any",
            Self::Automatic => "automatic",
            Self::Content => "content",
            Self::Name => "name",
            Self::ParentPath => "parentPath",
        };
        f.write_str(s)
    }
}
