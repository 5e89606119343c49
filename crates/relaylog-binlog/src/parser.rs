//! Whole-file parsing

use bytes::Bytes;

use crate::error::CodecError;
use crate::event::{decode_event, BinlogEvent, EventBody};
use crate::header::{ChecksumAlgorithm, EventHeader, BINLOG_MAGIC, EVENT_HEADER_LEN};

/// Check that `data` starts with the binlog magic header
pub fn check_magic(data: &[u8]) -> Result<(), CodecError> {
    if data.len() < BINLOG_MAGIC.len() {
        return Err(CodecError::truncated(
            "magic header",
            BINLOG_MAGIC.len(),
            data.len(),
        ));
    }
    if data[..BINLOG_MAGIC.len()] != BINLOG_MAGIC {
        return Err(CodecError::BadMagic(data[..BINLOG_MAGIC.len()].to_vec()));
    }
    Ok(())
}

/// Decode every event of a complete binlog file image
///
/// The checksum algorithm is taken from the most recent format description
/// (CRC32 until one is seen). A trailing partial event is an error.
pub fn parse_file_bytes(data: &[u8]) -> Result<Vec<BinlogEvent>, CodecError> {
    check_magic(data)?;
    let data = Bytes::copy_from_slice(data);
    let mut checksum = ChecksumAlgorithm::default();
    let mut events = Vec::new();
    let mut offset = BINLOG_MAGIC.len();

    while offset < data.len() {
        let header = EventHeader::decode(&data[offset..])?;
        let size = header.event_size as usize;
        if size < EVENT_HEADER_LEN {
            return Err(CodecError::invalid_body(
                "event",
                format!("event at {} declares size {}", offset, size),
            ));
        }
        if offset + size > data.len() {
            return Err(CodecError::truncated("event", size, data.len() - offset));
        }

        let event = decode_event(data.slice(offset..offset + size), checksum)?;
        if let EventBody::FormatDescription(fde) = &event.body {
            checksum = fde.checksum;
        }
        offset += size;
        events.push(event);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::EventGenerator;

    #[test]
    fn test_parse_generated_file() {
        let mut g = EventGenerator::new(11, 0, 1, ChecksumAlgorithm::Crc32);
        let (mut events, mut data) = g.gen_file_header().unwrap();
        let (ddl, ddl_data) = g.gen_ddl("db", "CREATE DATABASE `db`").unwrap();
        events.extend(ddl);
        data.extend(ddl_data);

        let parsed = parse_file_bytes(&data).unwrap();
        assert_eq!(parsed, events);
    }

    #[test]
    fn test_parse_checksum_off_file() {
        let mut g = EventGenerator::new(11, 0, 1, ChecksumAlgorithm::Off);
        let (events, data) = g.gen_file_header().unwrap();
        assert_eq!(parse_file_bytes(&data).unwrap(), events);
    }

    #[test]
    fn test_bad_magic() {
        let err = parse_file_bytes(b"\xfebim").unwrap_err();
        assert!(matches!(err, CodecError::BadMagic(_)));
    }

    #[test]
    fn test_torn_tail_rejected() {
        let mut g = EventGenerator::new(11, 0, 1, ChecksumAlgorithm::Crc32);
        let (_, data) = g.gen_file_header().unwrap();
        let err = parse_file_bytes(&data[..data.len() - 3]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }
}
