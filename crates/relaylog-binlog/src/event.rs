//! Decoded binlog events
//!
//! A [`BinlogEvent`] keeps the raw encoded bytes next to the decoded header
//! and body. Writers persist `raw` verbatim; the decoded parts only drive
//! dispatch and validation.

use bytes::Bytes;

use crate::error::CodecError;
use crate::header::{
    read_u32, verify_checksum, ChecksumAlgorithm, EventHeader, EventType, CRC32_LEN,
    EVENT_HEADER_LEN, LOG_EVENT_RELAY_LOG_F,
};

/// Length of the server version field in a format description event
pub const SERVER_VERSION_LEN: usize = 50;

/// Format description event body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptionBody {
    pub binlog_version: u16,
    pub server_version: String,
    pub create_timestamp: u32,
    pub header_len: u8,
    pub post_header_lens: Vec<u8>,
    pub checksum: ChecksumAlgorithm,
}

/// Rotate event body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateBody {
    /// Start offset of the first event in the next file
    pub position: u64,
    /// Name of the next file
    pub next_log_name: String,
}

/// Query event body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBody {
    pub thread_id: u32,
    pub exec_time: u32,
    pub error_code: u16,
    pub status_vars: Bytes,
    pub schema: Bytes,
    pub query: Bytes,
}

/// User variable event body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserVarBody {
    pub name: Bytes,
    pub is_null: bool,
    /// Type, charset and value bytes when `is_null` is false
    pub value: Bytes,
}

/// Decoded event body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    FormatDescription(FormatDescriptionBody),
    Rotate(RotateBody),
    Query(QueryBody),
    UserVar(UserVarBody),
    Xid { xid: u64 },
    /// Body bytes of an event this codec does not interpret
    Other(Bytes),
}

/// Dispatch view of an event, as seen by relay writers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind<'a> {
    /// Mandatory first event of every file
    FormatDescription(&'a FormatDescriptionBody),
    /// Rotation written by the source at the end of a file
    Rotate(&'a RotateBody),
    /// Rotation synthesized by the source as a control signal (zero timestamp)
    FakeRotate(&'a RotateBody),
    /// Filler produced by a relay to cover a hole
    Padding,
    /// Everything else
    Generic,
}

/// A single binlog event with its raw encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogEvent {
    pub header: EventHeader,
    pub body: EventBody,
    pub raw: Bytes,
}

impl BinlogEvent {
    /// Classify the event for writer dispatch
    pub fn kind(&self) -> EventKind<'_> {
        match &self.body {
            EventBody::FormatDescription(fde) => EventKind::FormatDescription(fde),
            EventBody::Rotate(rotate) if self.header.timestamp == 0 => EventKind::FakeRotate(rotate),
            EventBody::Rotate(rotate) => EventKind::Rotate(rotate),
            EventBody::Query(_) | EventBody::UserVar(_)
                if self.header.flags & LOG_EVENT_RELAY_LOG_F != 0 =>
            {
                EventKind::Padding
            }
            EventBody::Query(_) | EventBody::UserVar(_) | EventBody::Xid { .. } | EventBody::Other(_) => {
                EventKind::Generic
            }
        }
    }

    /// Encoded length in bytes
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the raw encoding is empty (never true for decoded events)
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Start offset declared by the header
    pub fn start_pos(&self) -> Option<u32> {
        self.header.start_pos()
    }
}

/// Decode one complete raw event
///
/// `checksum` is the algorithm announced by the file's format description;
/// format description events carry their own algorithm and ignore it.
pub fn decode_event(raw: Bytes, checksum: ChecksumAlgorithm) -> Result<BinlogEvent, CodecError> {
    let header = EventHeader::decode(&raw)?;
    if header.event_size as usize != raw.len() {
        return Err(CodecError::SizeMismatch {
            declared: header.event_size,
            actual: raw.len(),
        });
    }

    if header.event_type == EventType::FormatDescription {
        let fde = decode_format_description(&raw)?;
        return Ok(BinlogEvent {
            header,
            body: EventBody::FormatDescription(fde),
            raw,
        });
    }

    let trailer = checksum.trailer_len();
    if raw.len() < EVENT_HEADER_LEN + trailer {
        return Err(CodecError::truncated(
            "event body",
            EVENT_HEADER_LEN + trailer,
            raw.len(),
        ));
    }
    if checksum == ChecksumAlgorithm::Crc32 {
        verify_checksum(&raw)?;
    }
    let body = raw.slice(EVENT_HEADER_LEN..raw.len() - trailer);

    let body = match header.event_type {
        EventType::Rotate => EventBody::Rotate(decode_rotate(&body)?),
        EventType::Query => EventBody::Query(decode_query(&body)?),
        EventType::UserVar => EventBody::UserVar(decode_user_var(&body)?),
        EventType::Xid => {
            if body.len() < 8 {
                return Err(CodecError::truncated("xid body", 8, body.len()));
            }
            let mut xid = [0u8; 8];
            xid.copy_from_slice(&body[..8]);
            EventBody::Xid {
                xid: u64::from_le_bytes(xid),
            }
        }
        _ => EventBody::Other(body),
    };

    Ok(BinlogEvent { header, body, raw })
}

fn decode_format_description(raw: &[u8]) -> Result<FormatDescriptionBody, CodecError> {
    const FIXED: usize = 2 + SERVER_VERSION_LEN + 4 + 1;
    let min = EVENT_HEADER_LEN + FIXED + 1;
    if raw.len() < min {
        return Err(CodecError::truncated(
            "format description",
            min,
            raw.len(),
        ));
    }

    // The algorithm byte sits right before the CRC when one is present.
    let checksum = if raw.len() >= min + CRC32_LEN
        && raw[raw.len() - CRC32_LEN - 1] == ChecksumAlgorithm::Crc32.as_byte()
        && verify_checksum(raw).is_ok()
    {
        ChecksumAlgorithm::Crc32
    } else {
        ChecksumAlgorithm::from_byte(raw[raw.len() - 1])?
    };
    let alg_at = raw.len() - checksum.trailer_len() - 1;

    let body = &raw[EVENT_HEADER_LEN..];
    let binlog_version = u16::from_le_bytes([body[0], body[1]]);
    let version_bytes = &body[2..2 + SERVER_VERSION_LEN];
    let version_end = version_bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(SERVER_VERSION_LEN);
    let server_version = String::from_utf8_lossy(&version_bytes[..version_end]).into_owned();
    let create_timestamp = read_u32(body, 2 + SERVER_VERSION_LEN);
    let header_len = body[2 + SERVER_VERSION_LEN + 4];
    let post_header_lens = raw[EVENT_HEADER_LEN + FIXED..alg_at].to_vec();

    if header_len as usize != EVENT_HEADER_LEN {
        return Err(CodecError::invalid_body(
            "FormatDescription",
            format!("unsupported header length {}", header_len),
        ));
    }

    Ok(FormatDescriptionBody {
        binlog_version,
        server_version,
        create_timestamp,
        header_len,
        post_header_lens,
        checksum,
    })
}

fn decode_rotate(body: &[u8]) -> Result<RotateBody, CodecError> {
    if body.len() < 8 {
        return Err(CodecError::truncated("rotate body", 8, body.len()));
    }
    let mut position = [0u8; 8];
    position.copy_from_slice(&body[..8]);
    let next_log_name = std::str::from_utf8(&body[8..])
        .map_err(|e| CodecError::invalid_body("Rotate", e.to_string()))?
        .to_string();
    Ok(RotateBody {
        position: u64::from_le_bytes(position),
        next_log_name,
    })
}

fn decode_query(body: &[u8]) -> Result<QueryBody, CodecError> {
    const POST_HEADER: usize = 4 + 4 + 1 + 2 + 2;
    if body.len() < POST_HEADER {
        return Err(CodecError::truncated("query post-header", POST_HEADER, body.len()));
    }
    let thread_id = read_u32(body, 0);
    let exec_time = read_u32(body, 4);
    let schema_len = body[8] as usize;
    let error_code = u16::from_le_bytes([body[9], body[10]]);
    let status_len = u16::from_le_bytes([body[11], body[12]]) as usize;

    let schema_at = POST_HEADER + status_len;
    let query_at = schema_at + schema_len + 1;
    if body.len() < query_at {
        return Err(CodecError::truncated("query body", query_at, body.len()));
    }
    if body[schema_at + schema_len] != 0 {
        return Err(CodecError::invalid_body(
            "Query",
            "schema is not NUL terminated",
        ));
    }

    Ok(QueryBody {
        thread_id,
        exec_time,
        error_code,
        status_vars: Bytes::copy_from_slice(&body[POST_HEADER..schema_at]),
        schema: Bytes::copy_from_slice(&body[schema_at..schema_at + schema_len]),
        query: Bytes::copy_from_slice(&body[query_at..]),
    })
}

fn decode_user_var(body: &[u8]) -> Result<UserVarBody, CodecError> {
    if body.len() < 4 {
        return Err(CodecError::truncated("user var body", 4, body.len()));
    }
    let name_len = read_u32(body, 0) as usize;
    let null_at = 4 + name_len;
    if body.len() < null_at + 1 {
        return Err(CodecError::truncated("user var body", null_at + 1, body.len()));
    }
    Ok(UserVarBody {
        name: Bytes::copy_from_slice(&body[4..null_at]),
        is_null: body[null_at] != 0,
        value: Bytes::copy_from_slice(&body[null_at + 1..]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{gen_format_description, gen_query, gen_rotate};

    fn template(timestamp: u32) -> EventHeader {
        EventHeader::new(timestamp, 11, 0x01)
    }

    #[test]
    fn test_kind_dispatch() {
        let fde = gen_format_description(&template(1), 4, ChecksumAlgorithm::Crc32).unwrap();
        assert!(matches!(fde.kind(), EventKind::FormatDescription(_)));

        let rotate = gen_rotate(&template(1), 123, "bin.000002", 4, ChecksumAlgorithm::Crc32).unwrap();
        assert!(matches!(rotate.kind(), EventKind::Rotate(r) if r.next_log_name == "bin.000002"));

        let fake = gen_rotate(&template(0), 123, "bin.000002", 4, ChecksumAlgorithm::Crc32).unwrap();
        assert!(matches!(fake.kind(), EventKind::FakeRotate(_)));

        let query = gen_query(&template(1), 123, 0, b"", b"schema", b"BEGIN", ChecksumAlgorithm::Crc32)
            .unwrap();
        assert_eq!(query.kind(), EventKind::Generic);
    }

    #[test]
    fn test_decode_matches_generated() {
        let query = gen_query(&template(7), 123, 5, b"", b"db", b"CREATE TABLE t (c INT)", ChecksumAlgorithm::Crc32)
            .unwrap();
        let decoded = decode_event(query.raw.clone(), ChecksumAlgorithm::Crc32).unwrap();
        assert_eq!(decoded, query);
        match decoded.body {
            EventBody::Query(body) => {
                assert_eq!(&body.schema[..], b"db");
                assert_eq!(&body.query[..], b"CREATE TABLE t (c INT)");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_decode_format_description_checksum_off() {
        let fde = gen_format_description(&template(1), 4, ChecksumAlgorithm::Off).unwrap();
        let decoded = decode_event(fde.raw.clone(), ChecksumAlgorithm::Crc32).unwrap();
        match decoded.body {
            EventBody::FormatDescription(body) => {
                assert_eq!(body.checksum, ChecksumAlgorithm::Off);
                assert_eq!(body.binlog_version, 4);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let rotate = gen_rotate(&template(1), 123, "bin.000002", 4, ChecksumAlgorithm::Crc32).unwrap();
        let truncated = rotate.raw.slice(..rotate.raw.len() - 1);
        let err = decode_event(truncated, ChecksumAlgorithm::Crc32).unwrap_err();
        assert!(matches!(err, CodecError::SizeMismatch { .. }));
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        let rotate = gen_rotate(&template(1), 123, "bin.000002", 4, ChecksumAlgorithm::Crc32).unwrap();
        let mut raw = rotate.raw.to_vec();
        raw[EVENT_HEADER_LEN + 9] ^= 0x20;
        let err = decode_event(Bytes::from(raw), ChecksumAlgorithm::Crc32).unwrap_err();
        assert!(matches!(err, CodecError::ChecksumMismatch { .. }));
    }
}
