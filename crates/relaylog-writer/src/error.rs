//! Error types for relaylog-writer
//!
//! `DuplicateConflict` and `GapTooSmall` report an inconsistent upstream
//! stream rather than a writer fault; they are meant to be escalated to
//! whatever owns the upstream connection.

use std::io;
use std::path::PathBuf;

use relaylog_binlog::CodecError;
use thiserror::Error;

/// Errors returned by relay writer operations
#[derive(Debug, Error)]
pub enum WriterError {
    /// `init` was never called, or no filename is known yet
    #[error("relay writer is not valid: {0}")]
    NotConfigured(String),

    /// `init` was called more than once
    #[error("relay writer already initialized for source {0:?}")]
    AlreadyInitialized(String),

    /// Source id or event cannot be used as given
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Target filename breaks the `<base>.<6 digits>` rule
    #[error("relay log filename {0:?} is not valid")]
    InvalidFilename(String),

    /// A write needs an open file but none is open
    #[error("file not opened: {0}")]
    FileNotOpened(String),

    /// A hole is smaller than the smallest encodable dummy event
    #[error(
        "generate dummy event at {position} with size {size}: required dummy event size {size} is too small, the minimum supported size is {min}"
    )]
    GapTooSmall { position: u32, size: u32, min: u32 },

    /// An overlapping event does not match what is already stored
    #[error("handle a potential duplicate event [{start}, {end}) in {filename}: {reason}")]
    DuplicateConflict {
        filename: String,
        start: u64,
        end: u64,
        reason: String,
    },

    /// Filesystem failure (open, create, write, flush, read)
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// An existing relay log file cannot be resumed
    #[error("relay log file {} is corrupted: {reason}", path.display())]
    Corrupted { path: PathBuf, reason: String },

    /// Event encoding failure
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl WriterError {
    /// Create a new Io error with context
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a new InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a new Corrupted error
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a filesystem not-found failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// Whether the error signals an inconsistent upstream stream
    pub fn is_upstream_inconsistency(&self) -> bool {
        matches!(self, Self::DuplicateConflict { .. } | Self::GapTooSmall { .. })
    }
}

/// Errors loading writer configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration text is not valid TOML for this schema
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
