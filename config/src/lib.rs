// SPDX-License-Identifier: MPL-2.0

//! Construction options for the background switcher.
//!
//! [`Options`] is what an embedder supplies: every field is optional and
//! unknown fields are ignored. [`Options::merge`] folds it over the defaults
//! to produce the immutable [`Config`] the component is built from.

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_ID: &str = "bg-switcher";

/// Number of selectable backgrounds.
pub const BACKGROUND_COUNT: usize = 9;

/// Index selected on construction.
pub const DEFAULT_INDEX: usize = 4;

pub const DEFAULT_INTERVAL_MS: u64 = 10_000;

/// Container used when the embedder does not name one.
pub const DEFAULT_CONTAINER: &str = "body";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read options file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write options file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid options: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize options: {0}")]
    Serialize(#[from] ron::Error),
}

/// Reference to the element the switcher inserts its markup into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Container(String);

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new(DEFAULT_CONTAINER)
    }
}

impl From<&str> for Container {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options as supplied by the embedding page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Setters)]
#[serde(default)]
#[setters(strip_option)]
pub struct Options {
    pub container: Option<Container>,
    pub auto_rotate: Option<bool>,
    /// Milliseconds between automatic switches. Zero means "use the default".
    pub auto_rotate_interval: Option<u64>,
    pub enable_thumbs: Option<bool>,
    pub enable_progressive_blur: Option<bool>,
}

impl Options {
    /// Options used when a stylesheet triggers automatic construction.
    pub fn bootstrap() -> Self {
        Self::default()
            .auto_rotate(true)
            .auto_rotate_interval(DEFAULT_INTERVAL_MS)
    }

    /// Folds these options over the defaults.
    pub fn merge(self) -> Config {
        Config {
            container: self.container.unwrap_or_default(),
            auto_rotate: self.auto_rotate.unwrap_or(true),
            auto_rotate_interval: self
                .auto_rotate_interval
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_INTERVAL_MS),
            enable_thumbs: self.enable_thumbs.unwrap_or(true),
            enable_progressive_blur: self.enable_progressive_blur.unwrap_or(true),
        }
    }

    pub fn from_ron(input: &str) -> Result<Self, ConfigError> {
        Ok(ron_options().from_str(input)?)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron_options().to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&input)
    }

    /// Like [`Options::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::debug!(?path, "options file not found, using defaults");
                Ok(Self::default())
            }
            result => result,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let output = self.to_ron()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, output).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `$XDG_CONFIG_HOME/bg-switcher/options.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_ID).join("options.ron"))
    }
}

fn ron_options() -> ron::Options {
    ron::Options::default().with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
}

/// Merged configuration. Fixed for the lifetime of a switcher except for the
/// rotation interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub container: Container,
    pub auto_rotate: bool,
    /// Milliseconds, always positive.
    pub auto_rotate_interval: u64,
    pub enable_thumbs: bool,
    pub enable_progressive_blur: bool,
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.auto_rotate_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Options::default().merge()
    }
}

impl From<Options> for Config {
    fn from(options: Options) -> Self {
        options.merge()
    }
}
