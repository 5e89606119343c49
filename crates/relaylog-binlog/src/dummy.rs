//! Dummy (padding) events
//!
//! A relay fills a hole in its byte stream with a single event of exactly
//! the hole's size. Small holes use a NULL user-variable event whose name is
//! stretched to fit; larger ones use a query event holding a SQL comment.
//! Both are flagged `LOG_EVENT_RELAY_LOG_F` so readers can skip them.
//!
//! Size floors with CRC32 checksums:
//!
//! | event     | layout                                            | floor |
//! |-----------|---------------------------------------------------|-------|
//! | USER_VAR  | header + name_len(4) + name(1) + is_null(1) + crc | 29    |
//! | QUERY     | header + post-header(13) + NUL(1) + query(1) + crc| 38    |
//!
//! Without checksums both floors drop by four bytes.

use crate::error::CodecError;
use crate::event::BinlogEvent;
use crate::generate::{assemble, gen_query};
use crate::header::{
    ChecksumAlgorithm, EventHeader, EventType, CRC32_LEN, EVENT_HEADER_LEN,
    LOG_EVENT_RELAY_LOG_F, LOG_EVENT_SUPPRESS_USE_F, LOG_EVENT_THREAD_SPECIFIC_F,
};

/// Minimum USER_VAR dummy event size with CRC32 checksums
pub const MIN_USER_VAR_EVENT_LEN: u32 = (EVENT_HEADER_LEN + 4 + 1 + 1 + CRC32_LEN) as u32;

/// Minimum QUERY dummy event size with CRC32 checksums
pub const MIN_QUERY_EVENT_LEN: u32 = (EVENT_HEADER_LEN + 4 + 4 + 1 + 2 + 2 + 1 + 1 + CRC32_LEN) as u32;

const DUMMY_USER_VAR_NAME: &[u8] = b"!dummyvar";
const DUMMY_QUERY: &[u8] =
    b"# dummy query generated by relaylog, often used to fill a hole in a binlog file";

/// Smallest dummy event that can be encoded for `checksum`
pub fn min_dummy_event_len(checksum: ChecksumAlgorithm) -> u32 {
    MIN_USER_VAR_EVENT_LEN - (CRC32_LEN - checksum.trailer_len()) as u32
}

fn min_query_event_len(checksum: ChecksumAlgorithm) -> u32 {
    MIN_QUERY_EVENT_LEN - (CRC32_LEN - checksum.trailer_len()) as u32
}

/// Generate a dummy event of exactly `event_size` bytes starting at `latest_pos`
///
/// The template supplies timestamp and server id; flags are rewritten to
/// mark the event as relay-generated.
pub fn gen_dummy(
    template: &EventHeader,
    latest_pos: u32,
    event_size: u32,
    checksum: ChecksumAlgorithm,
) -> Result<BinlogEvent, CodecError> {
    let min = min_dummy_event_len(checksum);
    if event_size < min {
        return Err(CodecError::GapTooSmall {
            size: event_size,
            min,
        });
    }

    let mut header = *template;
    header.flags &= !LOG_EVENT_THREAD_SPECIFIC_F;
    header.flags |= LOG_EVENT_SUPPRESS_USE_F | LOG_EVENT_RELAY_LOG_F;

    let trailer = checksum.trailer_len();
    let event = if event_size < min_query_event_len(checksum) {
        let name_len = event_size as usize - (EVENT_HEADER_LEN + 4 + 1 + trailer);
        let mut body = Vec::with_capacity(4 + name_len + 1);
        body.extend_from_slice(&(name_len as u32).to_le_bytes());
        body.extend(DUMMY_USER_VAR_NAME.iter().cycle().take(name_len));
        body.push(1); // is_null
        assemble(&header, EventType::UserVar, latest_pos, &body, checksum)?
    } else {
        let query_len = event_size as usize - (EVENT_HEADER_LEN + 13 + 1 + trailer);
        let mut query = Vec::with_capacity(query_len);
        query.extend(DUMMY_QUERY.iter().take(query_len));
        query.resize(query_len, b' ');
        gen_query(&header, latest_pos, 0, b"", b"", &query, checksum)?
    };

    debug_assert_eq!(event.header.event_size, event_size);
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventBody, EventKind};

    fn template() -> EventHeader {
        EventHeader::new(1_700_000_000, 11, LOG_EVENT_THREAD_SPECIFIC_F)
    }

    #[test]
    fn test_floors() {
        assert_eq!(MIN_USER_VAR_EVENT_LEN, 29);
        assert_eq!(MIN_QUERY_EVENT_LEN, 38);
        assert_eq!(min_dummy_event_len(ChecksumAlgorithm::Crc32), 29);
        assert_eq!(min_dummy_event_len(ChecksumAlgorithm::Off), 25);
    }

    #[test]
    fn test_too_small() {
        let err = gen_dummy(&template(), 123, 28, ChecksumAlgorithm::Crc32).unwrap_err();
        assert_eq!(err, CodecError::GapTooSmall { size: 28, min: 29 });
    }

    #[test]
    fn test_exact_sizes() {
        for size in [29u32, 30, 37, 38, 39, 120, 4096] {
            let ev = gen_dummy(&template(), 123, size, ChecksumAlgorithm::Crc32).unwrap();
            assert_eq!(ev.raw.len(), size as usize, "size {}", size);
            assert_eq!(ev.header.log_pos, 123 + size);
            assert_eq!(ev.kind(), EventKind::Padding);
            assert_eq!(ev.header.flags & LOG_EVENT_THREAD_SPECIFIC_F, 0);
        }
    }

    #[test]
    fn test_body_choice() {
        let small = gen_dummy(&template(), 4, 30, ChecksumAlgorithm::Crc32).unwrap();
        match small.body {
            EventBody::UserVar(body) => {
                assert!(body.is_null);
                assert_eq!(&body.name[..], b"!d");
            }
            other => panic!("unexpected body {:?}", other),
        }

        let large = gen_dummy(&template(), 4, 200, ChecksumAlgorithm::Crc32).unwrap();
        match large.body {
            EventBody::Query(body) => {
                assert!(body.query.starts_with(b"# dummy query"));
                assert!(body.schema.is_empty());
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_checksum_off() {
        let ev = gen_dummy(&template(), 4, 25, ChecksumAlgorithm::Off).unwrap();
        assert_eq!(ev.raw.len(), 25);
        assert!(gen_dummy(&template(), 4, 24, ChecksumAlgorithm::Off).is_err());
    }
}
