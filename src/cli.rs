//! Command-line interface definitions and parsing
//!
//! This module defines the CLI structure for tagview using the `clap` crate.
//!
//! # Commands
//!
//! - **list**: List the facets below a query path, or its items once the
//!   path contains `,evaluate` (default)
//! - **rename**: Rename the tag at the end of a facet path
//! - **check**: Scan every input and report configuration and scan problems
//! - **tags**: Dump the tag graph
//! - **init**: Write a starter configuration
//!
//! # Examples
//!
//! ```
//! use tagview::cli::{Cli, Commands};
//!
//! let cli = Cli::parse_from_args(["tagview", "list", "/holiday/,not/me"]);
//! assert!(matches!(cli.get_command(), Commands::List { .. }));
//! ```

use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

use crate::output::PathFormat;

#[derive(Parser, Debug)]
#[command(name = "tagview")]
#[command(about = "A tag-indexed view of a directory tree", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (defaults to the user's config directory)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Suppress informational output (only print results)
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    /// Display item paths relative to the current directory
    #[arg(long = "relative", global = true)]
    pub relative: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List facets or, with `,evaluate`, matching items
    #[command(visible_alias = "ls")]
    List {
        /// Query path, e.g. `/person/,not/me/,evaluate`
        #[arg(value_name = "QUERY", default_value = "/")]
        query: String,

        /// Offer every candidate tag instead of only top-level ones
        #[arg(long = "flat")]
        flat: bool,
    },

    /// Rename a tag everywhere it is written
    #[command(visible_alias = "mv")]
    Rename {
        /// Facet path ending in the tag to rename, e.g. `/person/me`
        #[arg(value_name = "FROM")]
        from: String,

        /// Same path with the new name as last segment
        #[arg(value_name = "TO")]
        to: String,
    },

    /// Rescan every input and report problems
    Check,

    /// Show every tag with its parents and twins
    Tags,

    /// Write a starter configuration indexing ROOT
    Init {
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Overwrite an existing configuration
        #[arg(short = 'f', long = "force")]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse from an explicit argument list
    #[must_use]
    pub fn parse_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(args)
    }

    /// Get the command, defaulting to listing the root facets
    #[must_use]
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::List {
            query: "/".to_string(),
            flat: false,
        })
    }

    #[must_use]
    pub const fn path_format(&self) -> PathFormat {
        if self.relative {
            PathFormat::Relative
        } else {
            PathFormat::Absolute
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_lists_root() {
        let cli = Cli::parse_from_args(["tagview"]);
        assert_eq!(
            cli.get_command(),
            Commands::List {
                query: "/".into(),
                flat: false
            }
        );
    }

    #[test]
    fn test_parse_rename_with_global_flags() {
        let cli = Cli::parse_from_args(["tagview", "mv", "/person/me", "/person/myself", "--json", "-c", "x.toml"]);
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert_eq!(
            cli.get_command(),
            Commands::Rename {
                from: "/person/me".into(),
                to: "/person/myself".into()
            }
        );
    }

    #[test]
    fn test_parse_list_query_with_operators() {
        let cli = Cli::parse_from_args(["tagview", "ls", "/holiday/,not/me", "--flat", "--relative"]);
        assert_eq!(cli.path_format(), PathFormat::Relative);
        let Commands::List { query, flat } = cli.get_command() else {
            panic!("Expected List command");
        };
        assert_eq!(query, "/holiday/,not/me");
        assert!(flat);
    }
}
