//! Serde model of a configuration file
//!
//! ```toml
//! version = 2
//! include = ["people.toml"]
//!
//! [settings]
//! hierarchical_facets = true
//!
//! [[tags]]
//! name = "#me"
//! parents = ["#person"]
//! twins = ["#FranzMandl"]
//! priority = 1
//!
//! [[inputs]]
//! name = "photos"
//! path = "/srv/photos"
//! tags = ["#media"]
//! min_depth = 1
//! patterns.file.glob = ["*.jpg"]
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::patterns::{KindPatterns, MatchTarget, PatternError, PatternSet};
use crate::walk::{Level, PathCondition, SimpleCondition};

pub const CURRENT_VERSION: u32 = 2;

const fn yes() -> bool {
    true
}

const fn default_max_rename_iterations() -> usize {
    1000
}

const fn default_content_cache_capacity() -> u64 {
    10_000
}

/// Engine-wide switches, taken from the top-level file only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "yes")]
    pub hierarchical_facets: bool,
    #[serde(default = "default_max_rename_iterations")]
    pub max_rename_iterations: usize,
    #[serde(default = "default_content_cache_capacity")]
    pub content_cache_capacity: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hierarchical_facets: true,
            max_rename_iterations: default_max_rename_iterations(),
            content_cache_capacity: default_content_cache_capacity(),
        }
    }
}

/// One `[[tags]]` entry. Every tag reference carries the `#` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDecl {
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    /// Version 1 spelling of a single parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub twins: Vec<String>,
    #[serde(default)]
    pub priority: u8,
    #[serde(default = "yes")]
    pub rename: bool,
    #[serde(default)]
    pub min_suggestion_length: usize,
    /// File the declaration was read from
    #[serde(skip)]
    pub source: PathBuf,
}

impl TagDecl {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            parent: None,
            twins: Vec::new(),
            priority: 0,
            rename: true,
            min_suggestion_length: 0,
            source: PathBuf::new(),
        }
    }
}

/// Globs, regexes and whitelisted names of one pattern set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternDecl {
    pub glob: Vec<String>,
    pub regex: Vec<String>,
    /// Whitelisted names
    pub names: Vec<String>,
    /// Match against the full path instead of the name
    pub full_path: bool,
}

impl PatternDecl {
    fn compile(&self) -> Result<PatternSet, PatternError> {
        let target = if self.full_path { MatchTarget::Path } else { MatchTarget::Name };
        PatternSet::from_parts(&self.glob, &self.regex, &self.names, target)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindDecl {
    pub any: PatternDecl,
    pub directory: PatternDecl,
    pub file: PatternDecl,
}

impl KindDecl {
    /// # Errors
    /// Returns the first pattern that does not compile.
    pub fn compile(&self) -> Result<KindPatterns, PatternError> {
        Ok(KindPatterns {
            any: self.any.compile()?,
            directory: self.directory.compile()?,
            file: self.file.compile()?,
        })
    }
}

/// Explicit traversal level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDecl {
    #[serde(default)]
    pub patterns: KindDecl,
    #[serde(default)]
    pub transparent: Vec<String>,
    #[serde(default)]
    pub prune: Vec<String>,
    #[serde(default)]
    pub directories_only: bool,
    #[serde(default)]
    pub time: bool,
    #[serde(default = "yes")]
    pub yields: bool,
    /// Also report matching directories that are descended into
    #[serde(default)]
    pub containers: bool,
}

impl LevelDecl {
    fn compile(&self) -> Result<Level, PatternError> {
        Ok(Level {
            patterns: self.patterns.compile()?,
            transparent: self.transparent.iter().cloned().collect(),
            prune: self.prune.iter().cloned().collect(),
            ignore_non_directories: self.directories_only,
            time: self.time,
            yields: self.yields,
            yield_containers: self.containers,
        })
    }
}

/// Which items of an input get their content read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentDecl {
    pub min_depth: usize,
    pub max_depth: Option<usize>,
    pub patterns: KindDecl,
}

/// One `[[inputs]]` entry: either depth bounds or explicit `levels`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDecl {
    pub name: String,
    pub path: PathBuf,
    /// Automatic tags of every item
    #[serde(default)]
    pub tags: Vec<String>,
    /// Version 1 shorthand for `min_depth = max_depth = depth`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(default = "one")]
    pub min_depth: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub patterns: KindDecl,
    #[serde(default)]
    pub transparent: Vec<String>,
    #[serde(default)]
    pub prune: Vec<String>,
    #[serde(default)]
    pub directories_only: bool,
    #[serde(default)]
    pub time: bool,
    #[serde(default)]
    pub levels: Vec<LevelDecl>,
    /// Level repeated below the explicit ones
    #[serde(default)]
    pub final_level: Option<LevelDecl>,
    /// Skip directories holding a child whose name matches one of these
    #[serde(default)]
    pub content_prune: Vec<String>,
    #[serde(default)]
    pub content: Option<ContentDecl>,
    #[serde(skip)]
    pub source: PathBuf,
}

const fn one() -> usize {
    1
}

impl InputDecl {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            tags: Vec::new(),
            depth: None,
            min_depth: 1,
            max_depth: None,
            patterns: KindDecl::default(),
            transparent: Vec::new(),
            prune: Vec::new(),
            directories_only: false,
            time: false,
            levels: Vec::new(),
            final_level: None,
            content_prune: Vec::new(),
            content: None,
            source: PathBuf::new(),
        }
    }

    fn invalid(&self, reason: impl ToString) -> ConfigError {
        ConfigError::InvalidInput {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    /// Traversal condition of the input.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidInput` for bad depth bounds or patterns.
    pub fn condition(&self) -> Result<PathCondition, ConfigError> {
        let mut condition = if self.levels.is_empty() {
            let simple = SimpleCondition {
                min_depth: self.min_depth,
                max_depth: self.max_depth,
                patterns: self.patterns.compile().map_err(|e| self.invalid(e))?,
                transparent: self.transparent.iter().cloned().collect(),
                prune: self.prune.iter().cloned().collect(),
                ignore_non_directories: self.directories_only,
                time: self.time,
            };
            PathCondition::simple(&simple).map_err(|e| self.invalid(e))?
        } else {
            let levels = self
                .levels
                .iter()
                .map(LevelDecl::compile)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| self.invalid(e))?;
            let mut condition = PathCondition::new(levels);
            if let Some(level) = &self.final_level {
                condition = condition.with_final_level(level.compile().map_err(|e| self.invalid(e))?);
            }
            condition
        };
        for pattern in &self.content_prune {
            condition = condition
                .with_content_prune(pattern)
                .map_err(|e| self.invalid(e))?;
        }
        Ok(condition)
    }

    /// Condition selecting the items whose content is read, if restricted.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidInput` for bad depth bounds or patterns.
    pub fn content_condition(&self) -> Result<Option<PathCondition>, ConfigError> {
        let Some(content) = &self.content else {
            return Ok(None);
        };
        let simple = SimpleCondition {
            min_depth: content.min_depth,
            max_depth: content.max_depth,
            patterns: content.patterns.compile().map_err(|e| self.invalid(e))?,
            ..SimpleCondition::default()
        };
        PathCondition::simple(&simple)
            .map(Some)
            .map_err(|e| self.invalid(e))
    }
}

/// A single configuration file as written, any version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub tags: Vec<TagDecl>,
    #[serde(default)]
    pub inputs: Vec<InputDecl>,
}

/// A configuration with every include resolved and every file normalized
/// to [`CURRENT_VERSION`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionedConfig {
    pub version: u32,
    pub settings: Settings,
    pub tags: Vec<TagDecl>,
    pub inputs: Vec<InputDecl>,
    /// Every file read, top-level first
    pub files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_sparse_tables() {
        let raw: RawConfig = toml::from_str(
            r##"
            [[tags]]
            name = "#me"

            [[inputs]]
            name = "docs"
            path = "/srv/docs"
            "##,
        )
        .unwrap();
        assert_eq!(raw.version, None);
        assert!(raw.tags[0].rename);
        assert_eq!(raw.inputs[0].min_depth, 1);
        assert!(raw.inputs[0].max_depth.is_none());
    }

    #[test]
    fn test_levels_take_precedence_over_depth_bounds() {
        let mut input = InputDecl::new("photos", "/srv/photos");
        input.max_depth = Some(1);
        input.levels = vec![
            LevelDecl {
                patterns: KindDecl::default(),
                transparent: Vec::new(),
                prune: Vec::new(),
                directories_only: true,
                time: true,
                yields: false,
                containers: false,
            };
            2
        ];
        let condition = input.condition().unwrap();
        assert!(condition.level(1).is_some_and(|l| l.time && !l.yields));
        assert!(condition.level(2).is_none());
    }

    #[test]
    fn test_bad_bounds_and_patterns_are_reported() {
        let mut input = InputDecl::new("docs", "/srv/docs");
        input.min_depth = 3;
        input.max_depth = Some(2);
        let err = input.condition().unwrap_err();
        assert!(err.to_string().contains("maxDepth 2 < minDepth 3"), "{err}");

        let mut input = InputDecl::new("docs", "/srv/docs");
        input.patterns.file.regex = vec!["(".into()];
        assert!(matches!(input.condition(), Err(ConfigError::InvalidInput { .. })));
    }

    #[test]
    fn test_content_condition_is_optional() {
        let mut input = InputDecl::new("docs", "/srv/docs");
        assert!(input.content_condition().unwrap().is_none());
        input.content = Some(ContentDecl {
            patterns: KindDecl {
                file: PatternDecl {
                    glob: vec!["*.md".into()],
                    ..PatternDecl::default()
                },
                ..KindDecl::default()
            },
            ..ContentDecl::default()
        });
        assert!(input.content_condition().unwrap().is_some());
    }
}
