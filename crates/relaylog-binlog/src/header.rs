//! Binlog v4 common event header
//!
//! Every event starts with a fixed 19-byte little-endian header. The
//! `log_pos` field holds the offset just past the event in its file, so an
//! event occupies `[log_pos - event_size, log_pos)`.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Magic bytes at the start of every binlog and relay log file
pub const BINLOG_MAGIC: [u8; 4] = [0xfe, b'b', b'i', b'n'];

/// Length of the common event header (binlog v4)
pub const EVENT_HEADER_LEN: usize = 19;

/// Length of the trailing CRC32 checksum when checksums are enabled
pub const CRC32_LEN: usize = 4;

/// Binlog file is in use (set in the format description of an open file)
pub const LOG_EVENT_BINLOG_IN_USE_F: u16 = 0x0001;
/// Event depends on the executing thread (temporary tables)
pub const LOG_EVENT_THREAD_SPECIFIC_F: u16 = 0x0004;
/// Suppress generation of `USE` statements before the event
pub const LOG_EVENT_SUPPRESS_USE_F: u16 = 0x0008;
/// Event was created artificially by the server, not by a statement
pub const LOG_EVENT_ARTIFICIAL_F: u16 = 0x0020;
/// Event was created by a relay and is not real replicated data
pub const LOG_EVENT_RELAY_LOG_F: u16 = 0x0040;

/// Binlog event type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Query,
    Stop,
    Rotate,
    UserVar,
    FormatDescription,
    Xid,
    TableMap,
    Heartbeat,
    WriteRowsV2,
    Gtid,
    AnonymousGtid,
    PreviousGtids,
    /// Any other code, preserved verbatim
    Unknown(u8),
}

impl EventType {
    /// Map a wire code to an event type
    pub fn from_code(code: u8) -> Self {
        match code {
            2 => Self::Query,
            3 => Self::Stop,
            4 => Self::Rotate,
            14 => Self::UserVar,
            15 => Self::FormatDescription,
            16 => Self::Xid,
            19 => Self::TableMap,
            27 => Self::Heartbeat,
            30 => Self::WriteRowsV2,
            33 => Self::Gtid,
            34 => Self::AnonymousGtid,
            35 => Self::PreviousGtids,
            other => Self::Unknown(other),
        }
    }

    /// Wire code of this event type
    pub fn code(self) -> u8 {
        match self {
            Self::Query => 2,
            Self::Stop => 3,
            Self::Rotate => 4,
            Self::UserVar => 14,
            Self::FormatDescription => 15,
            Self::Xid => 16,
            Self::TableMap => 19,
            Self::Heartbeat => 27,
            Self::WriteRowsV2 => 30,
            Self::Gtid => 33,
            Self::AnonymousGtid => 34,
            Self::PreviousGtids => 35,
            Self::Unknown(code) => code,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "UNKNOWN_EVENT({})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Checksum algorithm announced by a format description event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChecksumAlgorithm {
    /// No checksum trailer
    Off,
    /// CRC32 (IEEE) over header and body
    #[default]
    Crc32,
}

impl ChecksumAlgorithm {
    /// Map the wire byte to an algorithm
    pub fn from_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0 => Ok(Self::Off),
            1 => Ok(Self::Crc32),
            other => Err(CodecError::invalid_body(
                "FormatDescription",
                format!("unsupported checksum algorithm {}", other),
            )),
        }
    }

    /// Wire byte of this algorithm
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Crc32 => 1,
        }
    }

    /// Number of trailer bytes this algorithm appends to every event
    pub fn trailer_len(self) -> usize {
        match self {
            Self::Off => 0,
            Self::Crc32 => CRC32_LEN,
        }
    }
}

/// Common event header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// Seconds since the epoch; zero marks a fake rotate event
    pub timestamp: u32,
    /// Event type
    pub event_type: EventType,
    /// Server that produced the event
    pub server_id: u32,
    /// Total encoded size including header and checksum
    pub event_size: u32,
    /// End offset of the event within its file
    pub log_pos: u32,
    /// `LOG_EVENT_*` flags
    pub flags: u16,
}

impl EventHeader {
    /// Template header; type, size and position are filled in by generators
    pub fn new(timestamp: u32, server_id: u32, flags: u16) -> Self {
        Self {
            timestamp,
            event_type: EventType::Unknown(0),
            server_id,
            event_size: 0,
            log_pos: 0,
            flags,
        }
    }

    /// Start offset of the event, or `None` if the header is inconsistent
    pub fn start_pos(&self) -> Option<u32> {
        self.log_pos.checked_sub(self.event_size)
    }

    /// Encode the header into 19 little-endian bytes
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.push(self.event_type.code());
        buf.extend_from_slice(&self.server_id.to_le_bytes());
        buf.extend_from_slice(&self.event_size.to_le_bytes());
        buf.extend_from_slice(&self.log_pos.to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
    }

    /// Decode a header from the first 19 bytes of `data`
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < EVENT_HEADER_LEN {
            return Err(CodecError::truncated(
                "event header",
                EVENT_HEADER_LEN,
                data.len(),
            ));
        }
        Ok(Self {
            timestamp: read_u32(data, 0),
            event_type: EventType::from_code(data[4]),
            server_id: read_u32(data, 5),
            event_size: read_u32(data, 9),
            log_pos: read_u32(data, 13),
            flags: u16::from_le_bytes([data[17], data[18]]),
        })
    }
}

pub(crate) fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Append the CRC32 of `buf` if the algorithm requires it
pub(crate) fn append_checksum(buf: &mut Vec<u8>, checksum: ChecksumAlgorithm) {
    if checksum == ChecksumAlgorithm::Crc32 {
        let crc = crc32fast::hash(buf);
        buf.extend_from_slice(&crc.to_le_bytes());
    }
}

/// Verify the CRC32 trailer of a complete raw event
pub fn verify_checksum(raw: &[u8]) -> Result<(), CodecError> {
    if raw.len() < EVENT_HEADER_LEN + CRC32_LEN {
        return Err(CodecError::truncated(
            "checksummed event",
            EVENT_HEADER_LEN + CRC32_LEN,
            raw.len(),
        ));
    }
    let split = raw.len() - CRC32_LEN;
    let stored = read_u32(raw, split);
    let computed = crc32fast::hash(&raw[..split]);
    if stored != computed {
        return Err(CodecError::ChecksumMismatch { stored, computed });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = EventHeader {
            timestamp: 0x01020304,
            event_type: EventType::Rotate,
            server_id: 11,
            event_size: 44,
            log_pos: 167,
            flags: LOG_EVENT_ARTIFICIAL_F,
        };
        let mut buf = Vec::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), EVENT_HEADER_LEN);
        assert_eq!(&buf[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(buf[4], 4);
        assert_eq!(EventHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_start_pos() {
        let mut header = EventHeader::new(1, 1, 0);
        header.event_size = 30;
        header.log_pos = 153;
        assert_eq!(header.start_pos(), Some(123));

        header.event_size = 200;
        assert_eq!(header.start_pos(), None);
    }

    #[test]
    fn test_unknown_type_preserved() {
        let ty = EventType::from_code(99);
        assert_eq!(ty, EventType::Unknown(99));
        assert_eq!(ty.code(), 99);
        assert_eq!(EventType::from_code(15), EventType::FormatDescription);
    }

    #[test]
    fn test_short_header_rejected() {
        let err = EventHeader::decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { available: 10, .. }));
    }

    #[test]
    fn test_checksum_verification() {
        let mut buf = vec![0u8; EVENT_HEADER_LEN];
        buf.extend_from_slice(b"payload");
        append_checksum(&mut buf, ChecksumAlgorithm::Crc32);
        assert!(verify_checksum(&buf).is_ok());

        buf[EVENT_HEADER_LEN] ^= 0xff;
        assert!(matches!(
            verify_checksum(&buf),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }
}
