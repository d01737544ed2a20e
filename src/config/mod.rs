//! Configuration resolution
//!
//! A configuration is a TOML file with `[settings]`, `[[tags]]` and
//! `[[inputs]]` tables plus an optional `include` list of further files,
//! resolved relative to the including file. [`ConfigSource::resolve`]
//! returns a [`VersionedConfig`]: every include read, every file
//! normalized to the current version and every declaration stamped with
//! the file it came from. The engine never parses raw syntax itself.
//!
//! The default configuration lives at `<config dir>/tagview/config.toml`.

pub mod error;
pub mod types;

pub use error::ConfigError;
pub use types::{
    CURRENT_VERSION, ContentDecl, InputDecl, KindDecl, LevelDecl, PatternDecl, RawConfig, Settings, TagDecl,
    VersionedConfig,
};

use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use tracing::{debug, info};

/// Get the path to the default configuration file
///
/// # Errors
///
/// Returns `ConfigError::NoConfigDir` if the system config directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join("tagview").join("config.toml"))
}

/// Something that turns a configuration path into a resolved configuration
pub trait ConfigSource: Send + Sync {
    /// # Errors
    /// Returns `ConfigError` when a file cannot be read or is malformed.
    fn resolve(&self, path: &Path) -> Result<VersionedConfig, ConfigError>;
}

/// Reads TOML files from disk through the `config` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct FileConfigSource;

impl FileConfigSource {
    fn read(path: &Path) -> Result<RawConfig, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let load = |source: ::config::ConfigError| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        };
        Config::builder()
            .add_source(File::from(path.to_path_buf()).format(FileFormat::Toml))
            .build()
            .map_err(load)?
            .try_deserialize()
            .map_err(load)
    }

    fn collect(path: &Path, stack: &mut Vec<PathBuf>, out: &mut VersionedConfig) -> Result<(), ConfigError> {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if stack.contains(&path) {
            return Err(ConfigError::IncludeCycle(path));
        }
        if out.files.contains(&path) {
            debug!(path = %path.display(), "already included");
            return Ok(());
        }
        let raw = normalize(Self::read(&path)?, &path)?;
        out.files.push(path.clone());
        if stack.is_empty()
            && let Some(settings) = raw.settings
        {
            out.settings = settings;
        }

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        out.tags.extend(raw.tags.into_iter().map(|mut tag| {
            tag.source.clone_from(&path);
            tag
        }));
        out.inputs.extend(raw.inputs.into_iter().map(|mut input| {
            input.path = base.join(&input.path);
            input.source.clone_from(&path);
            input
        }));

        stack.push(path);
        for include in &raw.include {
            Self::collect(&base.join(include), stack, out)?;
        }
        stack.pop();
        Ok(())
    }
}

impl ConfigSource for FileConfigSource {
    fn resolve(&self, path: &Path) -> Result<VersionedConfig, ConfigError> {
        let mut config = VersionedConfig {
            version: CURRENT_VERSION,
            ..VersionedConfig::default()
        };
        Self::collect(path, &mut Vec::new(), &mut config)?;
        info!(
            files = config.files.len(),
            tags = config.tags.len(),
            inputs = config.inputs.len(),
            "configuration resolved"
        );
        Ok(config)
    }
}

/// Bring a file of any supported version to [`CURRENT_VERSION`]. A file
/// without a `version` key is read as version 1.
///
/// # Errors
/// Returns `ConfigError::UnsupportedVersion` for unknown versions.
pub fn normalize(mut raw: RawConfig, path: &Path) -> Result<RawConfig, ConfigError> {
    let version = raw.version.unwrap_or(1);
    if version == 0 || version > CURRENT_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            version,
            path: path.to_path_buf(),
        });
    }
    for tag in &mut raw.tags {
        if let Some(parent) = tag.parent.take()
            && !tag.parents.contains(&parent)
        {
            tag.parents.push(parent);
        }
    }
    for input in &mut raw.inputs {
        if let Some(depth) = input.depth.take() {
            input.min_depth = depth;
            input.max_depth = Some(depth);
        }
    }
    raw.version = Some(CURRENT_VERSION);
    Ok(raw)
}

/// Starter configuration written by `tagview init`
///
/// # Errors
/// Returns `ConfigError::Serialize` if rendering fails.
pub fn example(root: &Path) -> Result<String, ConfigError> {
    let mut person = TagDecl::new("#person");
    person.priority = 1;
    let mut me = TagDecl::new("#me");
    me.parents = vec!["#person".into()];
    let mut documents = InputDecl::new("documents", root);
    documents.prune = vec![".git".into()];
    let raw = RawConfig {
        version: Some(CURRENT_VERSION),
        settings: Some(Settings::default()),
        tags: vec![person, me],
        inputs: vec![documents],
        ..RawConfig::default()
    };
    Ok(toml::to_string_pretty(&raw)?)
}

/// Write `contents` to `path`, creating parent directories.
///
/// # Errors
/// Returns `ConfigError::Io` if the directory or file cannot be written.
pub fn write(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TreeFixture;

    #[test]
    fn test_resolve_follows_includes_and_stamps_sources() {
        let fx = TreeFixture::new()
            .file(
                "config.toml",
                r##"
                version = 2
                include = ["more/people.toml"]

                [settings]
                max_rename_iterations = 5

                [[tags]]
                name = "#place"

                [[inputs]]
                name = "docs"
                path = "docs"
                "##,
            )
            .file(
                "more/people.toml",
                r##"
                [settings]
                max_rename_iterations = 99

                [[tags]]
                name = "#me"
                parent = "#person"
                "##,
            );
        let config = FileConfigSource.resolve(&fx.path("config.toml")).unwrap();

        assert_eq!(config.files.len(), 2);
        assert_eq!(config.settings.max_rename_iterations, 5);
        assert!(config.settings.hierarchical_facets);
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.tags[0].source, fx.path("config.toml"));
        assert_eq!(config.tags[1].source, fx.path("more/people.toml"));
        assert_eq!(config.tags[1].parents, ["#person"]);
        assert_eq!(config.inputs[0].path, fx.path("docs"));
    }

    #[test]
    fn test_include_cycle_is_an_error() {
        let fx = TreeFixture::new()
            .file("a.toml", "include = [\"b.toml\"]")
            .file("b.toml", "include = [\"a.toml\"]");
        let err = FileConfigSource.resolve(&fx.path("a.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IncludeCycle(_)), "{err}");
    }

    #[test]
    fn test_version_one_is_normalized() {
        let raw: RawConfig = toml::from_str(
            r##"
            version = 1
            [[tags]]
            name = "#me"
            parent = "#person"
            [[inputs]]
            name = "docs"
            path = "/srv"
            depth = 2
            "##,
        )
        .unwrap();
        let raw = normalize(raw, Path::new("c.toml")).unwrap();
        assert_eq!(raw.version, Some(2));
        assert_eq!(raw.tags[0].parents, ["#person"]);
        assert!(raw.tags[0].parent.is_none());
        assert_eq!((raw.inputs[0].min_depth, raw.inputs[0].max_depth), (2, Some(2)));

        let future = RawConfig {
            version: Some(3),
            ..RawConfig::default()
        };
        assert!(matches!(
            normalize(future, Path::new("c.toml")),
            Err(ConfigError::UnsupportedVersion { version: 3, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let fx = TreeFixture::new();
        let err = FileConfigSource.resolve(&fx.path("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_example_round_trips_through_resolve() {
        let fx = TreeFixture::new().dir("docs");
        let text = example(&fx.path("docs")).unwrap();
        write(&fx.path("cfg/config.toml"), &text).unwrap();
        let config = FileConfigSource.resolve(&fx.path("cfg/config.toml")).unwrap();
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.inputs[0].path, fx.path("docs"));
    }
}
