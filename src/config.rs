//! Configuration loading.
//!
//! Settings come from a TOML file.  Discovery order: an explicit path,
//! `.phpnaha.toml` in the first workspace folder, then
//! `<config dir>/phpnaha/config.toml`, falling back to defaults when none
//! exists.

use std::path::{Path, PathBuf};

use etcetera::BaseStrategy as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name looked up at the root of a workspace.
pub const WORKSPACE_CONFIG_FILE: &str = ".phpnaha.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub index: IndexConfig,
    pub logging: LoggingConfig,
}

/// Controls which files the indexer visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// File extensions (without the dot) treated as PHP sources.
    pub extensions: Vec<String>,
    /// Gitignore-style globs, relative to each root, that are not indexed.
    pub exclude: Vec<String>,
    /// Honour `.gitignore`, `.ignore` and hidden-file rules while walking.
    pub respect_ignore_files: bool,
    pub follow_links: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["php".to_string()],
            exclude: Vec::new(),
            respect_ignore_files: false,
            follow_links: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or a full `EnvFilter` directive.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// The effective filter: `RUST_LOG` when set, else `cli_level`, else
    /// the configured level.  Unparseable directives fall back to `info`.
    pub fn env_filter(&self, cli_level: Option<&str>) -> tracing_subscriber::EnvFilter {
        let directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .or_else(|| cli_level.map(str::to_owned))
            .unwrap_or_else(|| self.level.clone());

        tracing_subscriber::EnvFilter::try_new(&directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err.message().trim().to_string())
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load the configuration that applies to a workspace.
    ///
    /// Returns the defaults and `None` when no config file is found.
    pub fn load_for_workspace(
        workspace_root: Option<&Path>,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let Some(path) = discover_config_path(workspace_root) else {
            return Ok((Self::default(), None));
        };
        let config = Self::load_from_path(&path)?;
        Ok((config, Some(path)))
    }
}

/// The user-level config file location, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    let strategy = etcetera::base_strategy::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("phpnaha").join("config.toml"))
}

fn discover_config_path(workspace_root: Option<&Path>) -> Option<PathBuf> {
    workspace_root
        .map(|root| root.join(WORKSPACE_CONFIG_FILE))
        .into_iter()
        .chain(user_config_path())
        .find(|path| path.is_file())
}
