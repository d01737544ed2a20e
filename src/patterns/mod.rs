//! Pattern matching for traversal levels
//!
//! A [`PatternSet`] combines globs, regexes and a whitelist of exact names.
//! A [`KindPatterns`] groups three sets: one applied to every entry and one
//! each for directories and files. When the kind of an entry is not known
//! the [`MatchMode`] decides: optimistic evaluation lets it pass, pessimistic
//! evaluation rejects it.

pub mod error;

pub use error::{PatternError, PatternKind};

use std::collections::BTreeSet;
use std::path::Path;

use glob::Pattern as GlobPattern;
use regex::Regex;

use crate::fs::EntryKind;

/// How to treat information that cannot be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Unknown ⇒ pass. Used when re-evaluating a single path.
    Optimistic,
    /// Unknown ⇒ fail. Used while listing a subtree.
    Pessimistic,
}

impl MatchMode {
    #[must_use]
    pub const fn unknown_passes(self) -> bool {
        matches!(self, Self::Optimistic)
    }
}

/// What string a pattern is tested against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchTarget {
    /// The final path component
    #[default]
    Name,
    /// The full path, rendered with `/` separators
    Path,
}

/// A single glob or regex
#[derive(Debug, Clone)]
pub enum Pattern {
    Glob { original: String, compiled: GlobPattern },
    Regex { original: String, compiled: Regex },
}

impl Pattern {
    /// # Errors
    /// Returns `PatternError::InvalidEmpty` for an empty string and
    /// `PatternError::InvalidGlob` when the glob does not parse.
    pub fn glob(p: &str) -> Result<Self, PatternError> {
        if p.is_empty() {
            return Err(PatternError::InvalidEmpty { kind: PatternKind::Glob });
        }
        GlobPattern::new(p)
            .map(|g| Self::Glob {
                original: p.to_string(),
                compiled: g,
            })
            .map_err(|e| PatternError::glob_parse(p, &e.to_string()))
    }

    /// # Errors
    /// Returns `PatternError::InvalidEmpty` for an empty string and
    /// `PatternError::InvalidRegex` when the regex does not compile.
    pub fn regex(p: &str) -> Result<Self, PatternError> {
        if p.is_empty() {
            return Err(PatternError::InvalidEmpty { kind: PatternKind::Regex });
        }
        Regex::new(p)
            .map(|r| Self::Regex {
                original: p.to_string(),
                compiled: r,
            })
            .map_err(|e| PatternError::regex_compile(p, &e.to_string()))
    }

    #[must_use]
    pub fn is_match(&self, s: &str) -> bool {
        match self {
            Self::Glob { compiled, .. } => compiled.matches(s),
            Self::Regex { compiled, .. } => compiled.is_match(s),
        }
    }

    #[must_use]
    pub fn original(&self) -> &str {
        match self {
            Self::Glob { original, .. } | Self::Regex { original, .. } => original,
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Glob { original: a, .. }, Self::Glob { original: b, .. })
            | (Self::Regex { original: a, .. }, Self::Regex { original: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Pattern {}

/// Globs, regexes and whitelisted names. An empty set matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
    whitelist: BTreeSet<String>,
    target: MatchTarget,
}

impl PatternSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw glob, regex and whitelist strings.
    ///
    /// # Errors
    /// Returns the first `PatternError` encountered.
    pub fn from_parts(
        globs: &[String],
        regexes: &[String],
        whitelist: &[String],
        target: MatchTarget,
    ) -> Result<Self, PatternError> {
        let mut patterns = Vec::with_capacity(globs.len() + regexes.len());
        for g in globs {
            patterns.push(Pattern::glob(g)?);
        }
        for r in regexes {
            patterns.push(Pattern::regex(r)?);
        }
        let mut set = BTreeSet::new();
        for w in whitelist {
            if w.is_empty() {
                return Err(PatternError::InvalidEmpty { kind: PatternKind::Whitelist });
            }
            set.insert(w.clone());
        }
        Ok(Self {
            patterns,
            whitelist: set,
            target,
        })
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    #[must_use]
    pub fn with_whitelisted(mut self, name: impl Into<String>) -> Self {
        self.whitelist.insert(name.into());
        self
    }

    #[must_use]
    pub const fn with_target(mut self, target: MatchTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.whitelist.is_empty()
    }

    #[must_use]
    pub fn has_whitelist(&self) -> bool {
        !self.whitelist.is_empty()
    }

    /// `true` when there is no whitelist or `name` is on it
    #[must_use]
    pub fn admits_name(&self, name: &str) -> bool {
        self.whitelist.is_empty() || self.whitelist.contains(name)
    }

    /// Same set with the whitelist dropped
    #[must_use]
    pub fn without_whitelist(&self) -> Self {
        Self {
            patterns: self.patterns.clone(),
            whitelist: BTreeSet::new(),
            target: self.target,
        }
    }

    /// Test a name/path pair. Whitelisted names always match the name,
    /// never the full path.
    #[must_use]
    pub fn matches(&self, name: &str, path: &Path) -> bool {
        if self.is_empty() {
            return true;
        }
        if self.whitelist.contains(name) {
            return true;
        }
        let subject = match self.target {
            MatchTarget::Name => name.to_string(),
            MatchTarget::Path => path.to_string_lossy().replace('\\', "/"),
        };
        self.patterns.iter().any(|p| p.is_match(&subject))
    }
}

/// Pattern sets for "any entry", directories and files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindPatterns {
    pub any: PatternSet,
    pub directory: PatternSet,
    pub file: PatternSet,
}

impl KindPatterns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn any(set: PatternSet) -> Self {
        Self {
            any: set,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.any.is_empty() && self.directory.is_empty() && self.file.is_empty()
    }

    #[must_use]
    pub fn has_whitelist(&self) -> bool {
        self.any.has_whitelist() || self.directory.has_whitelist() || self.file.has_whitelist()
    }

    #[must_use]
    pub fn without_whitelist(&self) -> Self {
        Self {
            any: self.any.without_whitelist(),
            directory: self.directory.without_whitelist(),
            file: self.file.without_whitelist(),
        }
    }

    /// Whether a directory may be descended into. Only the directory set
    /// and the whitelist restrict descent; globs and regexes of the "any"
    /// set describe what is reported.
    #[must_use]
    pub fn admits_container(&self, name: &str, path: &Path) -> bool {
        self.any.admits_name(name) && self.directory.matches(name, path)
    }

    /// Evaluate an entry of the given kind.
    #[must_use]
    pub fn evaluate(&self, name: &str, path: &Path, kind: EntryKind, mode: MatchMode) -> bool {
        if !self.any.matches(name, path) {
            return false;
        }
        match kind {
            EntryKind::Directory => self.directory.matches(name, path),
            EntryKind::File => self.file.matches(name, path),
            EntryKind::Unknown => {
                (self.directory.is_empty() && self.file.is_empty()) || mode.unknown_passes()
            }
        }
    }
}
