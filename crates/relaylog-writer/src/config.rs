//! Writer configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a relay file writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Root directory holding one subdirectory per source
    pub relay_dir: PathBuf,
    /// Whether to `fsync` data after every append
    pub sync_on_write: bool,
    /// Whether to truncate a partially written trailing event on resume
    pub recover_torn_tail: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            relay_dir: PathBuf::from("./data/relay-log"),
            sync_on_write: true,
            recover_torn_tail: true,
        }
    }
}

impl WriterConfig {
    /// Default configuration rooted at `relay_dir`
    pub fn new(relay_dir: impl Into<PathBuf>) -> Self {
        Self {
            relay_dir: relay_dir.into(),
            ..Default::default()
        }
    }

    /// Set whether appends are synced to disk
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Set whether torn trailing events are truncated on resume
    pub fn with_recover_torn_tail(mut self, recover: bool) -> Self {
        self.recover_torn_tail = recover;
        self
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
