//! Output formatting for CLI display
//!
//! Listings, tag dumps and rename summaries are rendered either as
//! colored text for a terminal or as JSON.

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::engine::TagSummary;
use crate::query::Listing;
use crate::rename::RenameSummary;

/// Path display format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathFormat {
    /// Display absolute paths
    #[default]
    Absolute,
    /// Display relative paths (relative to current directory)
    Relative,
}

/// Format a path according to the display mode
#[must_use]
pub fn format_path(path: &Path, format: PathFormat) -> String {
    match format {
        PathFormat::Absolute => path.display().to_string(),
        PathFormat::Relative => {
            if let Ok(cwd) = std::env::current_dir()
                && let Ok(rel_path) = path.strip_prefix(&cwd)
            {
                return rel_path.display().to_string();
            }
            path.display().to_string()
        }
    }
}

/// Pretty JSON of any serializable result
///
/// # Errors
/// Returns `serde_json::Error` if serialization fails.
pub fn json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// One line per facet or item; query errors go to the end, in red.
#[must_use]
pub fn listing(listing: &Listing, format: PathFormat, quiet: bool) -> Vec<String> {
    let mut lines: Vec<String> = if listing.evaluated {
        listing.items.iter().map(|p| format_path(p, format)).collect()
    } else {
        listing
            .facets
            .iter()
            .map(|facet| {
                let text = facet.to_string();
                if quiet {
                    text
                } else if facet.child_of_current {
                    text.cyan().to_string()
                } else if listing.highlight.contains(&facet.name) {
                    text.bold().to_string()
                } else {
                    text
                }
            })
            .collect()
    };
    if !quiet {
        lines.extend(listing.errors.iter().map(|e| format!("error: {e}").red().to_string()));
    }
    lines
}

/// Format a tag with its relations
#[must_use]
pub fn tag_line(tag: &TagSummary, quiet: bool) -> String {
    if quiet {
        return tag.name.clone();
    }
    let mut line = format!("  {}", "!".repeat(usize::from(tag.priority)) + &tag.name);
    if !tag.parents.is_empty() {
        line.push_str(&format!(" < {}", tag.parents.join(", ")));
    }
    if !tag.twins.is_empty() {
        line.push_str(&format!(" = {}", tag.twins.join(", ")));
    }
    if tag.system {
        line = line.dimmed().to_string();
    } else if tag.placeholder {
        line = line.yellow().to_string();
    }
    line
}

#[must_use]
pub fn rename_summary(summary: &RenameSummary) -> String {
    format!(
        "Renamed {} to {}: {} config file(s), {} content, {} name and {} parent path change(s)",
        summary.from.yellow(),
        summary.to.green(),
        summary.config_files,
        summary.contents,
        summary.names,
        summary.parent_paths
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Facet;
    use std::path::PathBuf;

    #[test]
    fn test_quiet_listing_is_plain() {
        let listing = Listing {
            facets: vec![Facet {
                name: "beach".into(),
                priority: 1,
                child_of_current: true,
            }],
            errors: vec!["Unknown tag 'x'".into()],
            ..Listing::default()
        };
        assert_eq!(super::listing(&listing, PathFormat::Absolute, true), ["'!beach"]);
        assert_eq!(super::listing(&listing, PathFormat::Absolute, false).len(), 2);
    }

    #[test]
    fn test_evaluated_listing_prints_paths() {
        let listing = Listing {
            items: vec![PathBuf::from("/srv/a.txt")],
            evaluated: true,
            ..Listing::default()
        };
        assert_eq!(super::listing(&listing, PathFormat::Absolute, true), ["/srv/a.txt"]);
    }

    #[test]
    fn test_tag_line_quiet() {
        let tag = TagSummary {
            name: "me".into(),
            priority: 0,
            parents: vec!["person".into()],
            twins: Vec::new(),
            system: false,
            placeholder: false,
            rename_allowed: true,
        };
        assert_eq!(tag_line(&tag, true), "me");
        assert!(tag_line(&tag, false).contains("me < person"));
    }
}
