//! # Relaylog Writer
//!
//! Durable, position-faithful replay of an upstream binlog stream into
//! local relay log files.
//!
//! Each event's declared position must be honoured byte for byte:
//!
//! - **Append**: an event starting at the write offset is appended as is
//! - **Holes**: a gap before the event is covered by one dummy event
//! - **Duplicates**: an overlapping event is verified against the stored
//!   bytes and ignored when identical
//! - **Rotation**: real rotations seal the current file, fake rotations
//!   only retarget the next write
//!
//! ## Example
//!
//! ```rust,no_run
//! use relaylog_binlog::{gen_format_description, ChecksumAlgorithm, EventHeader};
//! use relaylog_writer::{FileWriter, Writer, WriterConfig};
//!
//! # async fn example() -> Result<(), relaylog_writer::WriterError> {
//! let writer = FileWriter::new(WriterConfig::new("/var/lib/relay"));
//! writer.init("3ccc475b-2343-11e7-be21-6c0b84d59f30.000001", "mysql-bin.000001").await?;
//!
//! let header = EventHeader::new(1_700_000_000, 11, 0);
//! let fde = gen_format_description(&header, 4, ChecksumAlgorithm::Crc32)?;
//! let result = writer.write_event(&fde).await?;
//! assert!(!result.is_ignored());
//!
//! writer.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod file_writer;
mod hole;
pub mod position;
mod rotation;
mod session;

use async_trait::async_trait;
use relaylog_binlog::BinlogEvent;
use serde::Serialize;

pub use config::WriterConfig;
pub use error::{ConfigError, WriterError};
pub use file_writer::FileWriter;
pub use position::{classify, compare_stored, DuplicateCheck, Placement};

/// Why an event was accepted without writing any bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum IgnoreReason {
    /// The event was written
    #[default]
    None,
    /// The exact bytes are already stored at the event's position
    AlreadyExists,
    /// The event is a fake rotate and only updated the target filename
    FakeRotate,
}

impl IgnoreReason {
    /// Human readable reason
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::None => "",
            IgnoreReason::AlreadyExists => "already exists",
            IgnoreReason::FakeRotate => "fake rotate event",
        }
    }
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful `write_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteResult {
    ignored: bool,
    reason: IgnoreReason,
}

impl WriteResult {
    /// The event's bytes were appended
    pub fn written() -> Self {
        Self::default()
    }

    /// The event was accepted without writing
    pub fn ignored(reason: IgnoreReason) -> Self {
        Self {
            ignored: true,
            reason,
        }
    }

    /// Whether no bytes were written for the event
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Why the event was ignored, `IgnoreReason::None` when written
    pub fn ignore_reason(&self) -> IgnoreReason {
        self.reason
    }
}

/// Point-in-time view of a writer for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriterStatus {
    /// Source id given to `init`
    pub source_id: Option<String>,
    /// Filename the next write targets
    pub filename: String,
    /// Write offset of the current (possibly sealed) file session
    pub offset: u64,
    /// Whether a file handle is currently held
    pub file_open: bool,
}

/// A relay log writer
///
/// Mutating calls are serialized per instance. The accessors read a
/// snapshot and never wait on an in-flight write.
#[async_trait]
pub trait Writer: Send + Sync {
    /// Bind the writer to a source and its initial filename
    ///
    /// Does not touch the filesystem. An empty filename is allowed when the
    /// first event will be a fake rotate.
    async fn init(&self, source_id: &str, filename: &str) -> Result<(), WriterError>;

    /// Write one event at its declared position
    async fn write_event(&self, event: &BinlogEvent) -> Result<WriteResult, WriterError>;

    /// Release the open file handle; safe to call repeatedly
    async fn close(&self) -> Result<(), WriterError>;

    /// Filename the next write targets
    fn filename(&self) -> String;

    /// Current write offset
    fn offset(&self) -> u64;

    /// Diagnostics snapshot
    fn status(&self) -> WriterStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_result() {
        let written = WriteResult::written();
        assert!(!written.is_ignored());
        assert_eq!(written.ignore_reason(), IgnoreReason::None);

        let ignored = WriteResult::ignored(IgnoreReason::AlreadyExists);
        assert!(ignored.is_ignored());
        assert_eq!(ignored.ignore_reason().to_string(), "already exists");
        assert_eq!(IgnoreReason::FakeRotate.as_str(), "fake rotate event");
    }

    #[test]
    fn test_status_serializes() {
        let status = WriterStatus {
            source_id: Some("src".into()),
            filename: "bin.000001".into(),
            offset: 123,
            file_open: true,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"offset\":123"));
    }
}
