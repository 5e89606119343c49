//! Error types for relaylog-binlog
//!
//! This module defines the errors raised while encoding, decoding and
//! synthesizing binlog events.

use thiserror::Error;

/// Errors that can occur in codec operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended before a complete structure could be read
    #[error("truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// Header-declared event size disagrees with the raw buffer
    #[error("event size mismatch: header says {declared}, raw data has {actual} bytes")]
    SizeMismatch { declared: u32, actual: usize },

    /// Stored CRC32 does not match the computed one
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// File does not start with the binlog magic header
    #[error("invalid binlog magic header {0:02x?}")]
    BadMagic(Vec<u8>),

    /// Event body could not be interpreted
    #[error("invalid {event} body: {reason}")]
    InvalidBody { event: &'static str, reason: String },

    /// A padding event cannot shrink below the encodable floor
    #[error("required dummy event size {size} is too small, the minimum supported size is {min}")]
    GapTooSmall { size: u32, min: u32 },
}

impl CodecError {
    /// Create a new Truncated error
    pub fn truncated(what: &'static str, needed: usize, available: usize) -> Self {
        Self::Truncated {
            what,
            needed,
            available,
        }
    }

    /// Create a new InvalidBody error
    pub fn invalid_body(event: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidBody {
            event,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_too_small_message() {
        let err = CodecError::GapTooSmall { size: 28, min: 29 };
        let msg = err.to_string();
        assert!(msg.contains("required dummy event size 28 is too small"));
        assert!(msg.contains("29"));
    }

    #[test]
    fn test_truncated_error() {
        let err = CodecError::truncated("event header", 19, 7);
        assert!(matches!(err, CodecError::Truncated { needed: 19, .. }));
        assert!(err.to_string().contains("event header"));
    }
}
