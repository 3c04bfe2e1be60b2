//! Configuration loaded from TOML.
//!
//! ```toml
//! [parser]
//! syntax = "deprecated"
//! allow_trailing = true
//! max_depth = 32
//!
//! [log]
//! level = "debug"
//! ```
//!
//! Every field is optional; missing sections take their defaults.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    parser::{DEFAULT_MAX_DEPTH, Parser, Syntax},
    registry::Registry,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid log level '{0}'")]
    LogLevel(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub parser: ParserConfig,
    pub log: LogConfig,
}

/// How queries are parsed
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    pub syntax: Syntax,
    /// Accept input left over after a compiled query
    pub allow_trailing: bool,
    /// Deepest nesting a query may have
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            syntax: Syntax::Current,
            allow_trailing: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.log.level_filter()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

impl ParserConfig {
    /// A parser with these settings
    pub fn parser<'r>(&self, registry: &'r Registry) -> Parser<'r> {
        Parser::new(registry)
            .with_syntax(self.syntax)
            .allow_trailing(self.allow_trailing)
            .max_depth(self.max_depth)
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<log::LevelFilter, ConfigError> {
        log::LevelFilter::from_str(&self.level).map_err(|_| ConfigError::LogLevel(self.level.clone()))
    }
}
