//! Query-path parsing
//!
//! A query path such as `/holiday/me/,not/beach/,evaluate` is cut into
//! tokens at `/` (empty path segments are dropped) and then at `,` (empty
//! tokens are kept). A plain token names a tag; an empty token switches the
//! following token to operator mode:
//!
//! | operator | effect |
//! |---|---|
//! | `not` | negate the next filter |
//! | `else` | drop items carrying a descendant of the last tag |
//! | `evaluate` | list matching items instead of facets |
//! | `reason<R>` | scope the next tag to one provenance |
//! | `relationship<R>` | scope the next tag to one closure |
//! | `path<Op>`, `content<Op>` | next token is a string value |
//! | `time<Op>` | next token is a `YYYY[-MM[-DD]]` date |

use tracing::trace;

use super::error::QueryError;
use super::filter::{Filter, Reason, Relationship, StringMatcher, StringOperator, TimeOperator};
use crate::tags::{TagGraph, TagId};
use crate::walk::CalendarDate;

/// Presentation prefix of a facet that is a direct child of the current tag
pub const CHILD_MARKER: char = '\'';
/// Presentation prefix repeated once per priority tier
pub const PRIORITY_MARKER: char = '!';

/// Tag name of a segment, without presentation markers
#[must_use]
pub fn strip_presentation(segment: &str) -> &str {
    segment
        .trim_start_matches(CHILD_MARKER)
        .trim_start_matches(PRIORITY_MARKER)
}

/// Cut a query path into tokens
#[must_use]
pub fn tokenize(query: &str) -> Vec<&str> {
    query
        .split('/')
        .filter(|segment| !segment.is_empty())
        .flat_map(|segment| segment.split(','))
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum ValueOperator {
    Path(StringOperator),
    Content(StringOperator),
    Time(TimeOperator),
}

/// State machine turning tokens into a filter pipeline
#[derive(Debug)]
pub struct FilterCtx<'g> {
    graph: &'g TagGraph,
    filters: Vec<Filter>,
    errors: Vec<QueryError>,
    operator_mode: bool,
    negate: bool,
    reason: Option<Reason>,
    relationship: Option<Relationship>,
    pending: Option<(ValueOperator, String)>,
    evaluate: bool,
    last_tag: Option<TagId>,
    positive: Vec<TagId>,
}

impl<'g> FilterCtx<'g> {
    #[must_use]
    pub const fn new(graph: &'g TagGraph) -> Self {
        Self {
            graph,
            filters: Vec::new(),
            errors: Vec::new(),
            operator_mode: false,
            negate: false,
            reason: None,
            relationship: None,
            pending: None,
            evaluate: false,
            last_tag: None,
            positive: Vec::new(),
        }
    }

    /// Parse a whole query path
    #[must_use]
    pub fn parse(graph: &'g TagGraph, query: &str) -> Self {
        let mut ctx = Self::new(graph);
        for token in tokenize(query) {
            ctx.push(token);
        }
        ctx.finish();
        ctx
    }

    pub fn push(&mut self, token: &str) {
        trace!("query token {token:?}");
        if self.evaluate {
            if !token.is_empty() {
                self.errors.push(QueryError::IllegalAppendix(token.to_string()));
            }
            return;
        }
        if let Some((operator, name)) = self.pending.take() {
            self.value(operator, &name, token);
            return;
        }
        if token.is_empty() {
            self.operator_mode = true;
            return;
        }
        if std::mem::take(&mut self.operator_mode) {
            self.operator(token);
        } else {
            self.tag(token);
        }
    }

    /// Report operators left without an operand
    pub fn finish(&mut self) {
        if let Some((_, name)) = self.pending.take() {
            self.errors.push(QueryError::MissingValue(name));
        }
        if std::mem::take(&mut self.negate) {
            self.errors.push(QueryError::Dangling("not".to_string()));
        }
        if let Some(reason) = self.reason.take() {
            self.errors.push(QueryError::Dangling(format!("reason{reason}")));
        }
        if self.relationship.take().is_some() {
            self.errors.push(QueryError::Dangling("relationship".to_string()));
        }
    }

    fn add(&mut self, filter: Filter) {
        let filter = if std::mem::take(&mut self.negate) {
            filter.negate()
        } else {
            filter
        };
        self.filters.push(filter);
    }

    fn tag(&mut self, token: &str) {
        let name = strip_presentation(token);
        let reason = self.reason.take().unwrap_or_default();
        let relationship = self.relationship.take().unwrap_or_default();
        let Some(tag) = self.graph.id(name) else {
            self.negate = false;
            self.errors.push(QueryError::UnknownTag(name.to_string()));
            return;
        };
        if !self.negate {
            self.last_tag = Some(tag);
            self.positive.push(tag);
        }
        self.add(Filter::Tag {
            tag,
            reason,
            relationship,
        });
    }

    fn operator(&mut self, token: &str) {
        let lower = token.to_ascii_lowercase();
        let split = |prefix: &str| lower.strip_prefix(prefix).map(|_| &token[prefix.len()..]);
        match lower.as_str() {
            "not" => self.negate = !self.negate,
            "evaluate" => self.evaluate = true,
            "else" => match self.last_tag {
                Some(tag) => self.add(Filter::Else(tag)),
                None => self.errors.push(QueryError::DanglingElse),
            },
            _ => {
                let result = if let Some(rest) = split("relationship") {
                    Relationship::try_from(rest).map(|r| self.relationship = Some(r))
                } else if let Some(rest) = split("reason") {
                    Reason::try_from(rest).map(|r| self.reason = Some(r))
                } else if let Some(rest) = split("path") {
                    StringOperator::try_from(rest)
                        .map(|op| self.pending = Some((ValueOperator::Path(op), token.to_string())))
                        .map_err(|()| QueryError::IllegalOperator(token.to_string()))
                } else if let Some(rest) = split("content") {
                    StringOperator::try_from(rest)
                        .map(|op| self.pending = Some((ValueOperator::Content(op), token.to_string())))
                        .map_err(|()| QueryError::IllegalOperator(token.to_string()))
                } else if let Some(rest) = split("time") {
                    TimeOperator::try_from(rest)
                        .map(|op| self.pending = Some((ValueOperator::Time(op), token.to_string())))
                        .map_err(|()| QueryError::IllegalOperator(token.to_string()))
                } else {
                    Err(QueryError::IllegalOperator(token.to_string()))
                };
                if let Err(err) = result {
                    self.errors.push(err);
                }
            }
        }
    }

    fn value(&mut self, operator: ValueOperator, name: &str, value: &str) {
        let filter = match operator {
            ValueOperator::Path(op) => StringMatcher::new(op, value).map(Filter::Path),
            ValueOperator::Content(op) => StringMatcher::new(op, value).map(Filter::Content),
            ValueOperator::Time(op) => CalendarDate::parse(value)
                .map(|date| Filter::Time { date, operator: op })
                .ok_or_else(|| QueryError::InvalidValue {
                    operator: name.to_string(),
                    value: value.to_string(),
                    reason: "expected YYYY, YYYY-MM or YYYY-MM-DD".to_string(),
                }),
        };
        match filter {
            Ok(filter) => self.add(filter),
            Err(err) => {
                self.negate = false;
                self.errors.push(err);
            }
        }
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub fn errors(&self) -> &[QueryError] {
        &self.errors
    }

    #[must_use]
    pub const fn is_evaluate(&self) -> bool {
        self.evaluate
    }

    /// Most recent non-negated tag filter
    #[must_use]
    pub const fn last_tag(&self) -> Option<TagId> {
        self.last_tag
    }

    /// Every non-negated tag filter, in query order
    #[must_use]
    pub fn positive_tags(&self) -> &[TagId] {
        &self.positive
    }

    /// Tags excluded by a `not` filter
    #[must_use]
    pub fn negated_tags(&self) -> Vec<TagId> {
        self.filters
            .iter()
            .filter_map(|filter| match filter {
                Filter::Not(inner) => inner.tag_id(),
                _ => None,
            })
            .collect()
    }
}
