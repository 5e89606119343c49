//! Logging configuration
//!
//! A relay process either writes for a single upstream source or hosts many
//! writers side by side. [`FileConfig::source_id`] splits the log file per
//! source, and [`LogConfig::writer_level`] raises or lowers the chatter of
//! the relay writer without touching the rest of the process.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Target of the relay writer crate, used for the `writer_level` directive
pub const WRITER_TARGET: &str = "relaylog_writer";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base filter directive; `RUST_LOG` replaces the whole filter when set
    pub level: String,

    /// Level for events from the relay writer, appended to `level`
    pub writer_level: Option<String>,

    pub console: ConsoleFormat,

    /// Colored console output
    pub ansi: bool,

    /// Send console output through the test harness so each test captures its own
    pub capture: bool,

    pub file: Option<FileConfig>,

    pub json: JsonFields,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            writer_level: None,
            console: ConsoleFormat::Json,
            ansi: false,
            capture: false,
            file: None,
            json: JsonFields::default(),
        }
    }
}

impl LogConfig {
    /// Pretty colored console output with the writer at debug
    pub fn development() -> Self {
        Self {
            writer_level: Some("debug".to_string()),
            console: ConsoleFormat::Pretty,
            ansi: true,
            ..Default::default()
        }
    }

    /// JSON lines in a daily rolled file, nothing on the console
    pub fn production(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            console: ConsoleFormat::Off,
            file: Some(FileConfig::new(log_dir)),
            ..Default::default()
        }
    }

    /// Like [`production`](Self::production), with the file named after one source
    pub fn for_source(log_dir: impl Into<PathBuf>, source_id: impl Into<String>) -> Self {
        let mut config = Self::production(log_dir);
        if let Some(file) = config.file.as_mut() {
            file.source_id = Some(source_id.into());
        }
        config
    }

    /// Warnings only, captured per test
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            console: ConsoleFormat::Pretty,
            capture: true,
            ..Default::default()
        }
    }

    /// Filter directives handed to `EnvFilter` when `RUST_LOG` is unset
    pub fn filter_directives(&self) -> String {
        match &self.writer_level {
            Some(level) => format!("{},{}={}", self.level, WRITER_TARGET, level),
            None => self.level.clone(),
        }
    }
}

/// What goes to the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleFormat {
    Off,
    /// Human readable lines
    Pretty,
    /// One JSON object per line
    #[default]
    Json,
}

/// JSON lines log file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Source the file is dedicated to; becomes part of the file name
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub rotation: RotationStrategy,
    /// Rolled files kept on disk, unlimited when unset
    #[serde(default)]
    pub keep: Option<usize>,
}

fn default_prefix() -> String {
    "relaylog".to_string()
}

impl FileConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: default_prefix(),
            source_id: None,
            rotation: RotationStrategy::Daily,
            keep: Some(14),
        }
    }

    /// File name prefix, `<prefix>-<source_id>` for a per-source file
    pub fn file_prefix(&self) -> String {
        match &self.source_id {
            Some(source_id) => format!("{}-{}", self.prefix, source_id),
            None => self.prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// A single file, truncated on start
    Never,
}

/// Optional fields of each JSON line
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFields {
    /// Enclosing spans, which carry the writer's filename and position
    pub spans: bool,
    /// Source file and line
    pub location: bool,
    pub thread: bool,
}

impl Default for JsonFields {
    fn default() -> Self {
        Self {
            spans: true,
            location: false,
            thread: false,
        }
    }
}
