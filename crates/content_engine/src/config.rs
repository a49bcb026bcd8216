//! Configuration for content loading
//!
//! A [`ContentConfig`] names the content root, the packages to load and
//! the loader flags, and can be read from or written to TOML and RON files
//! chosen by extension.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file did not parse.
    #[error("parse error: {0}")]
    Parse(String),

    /// The configuration could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// The file extension maps to no supported format.
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// File-backed configuration, stored as TOML or RON by extension.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Loads the configuration from a `.toml` or `.ron` file.
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Saves the configuration to a `.toml` or `.ron` file.
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// What to load and how: the content root directory, the packages under it
/// (in load order), and the loader behavior flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory the package directories live in.
    pub content_root: PathBuf,

    /// Package directory names to load, in order. Order decides package
    /// IDs and which package wins shadowed preset lookups.
    pub packages: Vec<String>,

    /// Skip packages whose index file is missing instead of failing.
    pub allow_missing_packages: bool,

    /// Let re-declared presets replace earlier ones of the same exact
    /// type and name.
    pub overwrite_duplicates: bool,

    /// Ignore `IncludeFile` directives, loading only what index files
    /// physically contain.
    pub skip_includes: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("data"),
            packages: Vec::new(),
            allow_missing_packages: false,
            overwrite_duplicates: false,
            skip_includes: false,
        }
    }
}

impl Config for ContentConfig {}
