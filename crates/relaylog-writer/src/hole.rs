//! Hole filling
//!
//! When an event starts past the write offset the missing range is covered
//! by one relay-generated dummy event so that later offsets stay valid.

use chrono::Utc;
use relaylog_binlog::{gen_dummy, BinlogEvent, ChecksumAlgorithm, CodecError, EventHeader};

use crate::error::WriterError;

/// Build a dummy event covering `[position, position + size)`
pub(crate) fn synthesize(
    server_id: u32,
    position: u32,
    size: u32,
    checksum: ChecksumAlgorithm,
) -> Result<BinlogEvent, WriterError> {
    let timestamp = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
    let template = EventHeader::new(timestamp, server_id, 0);

    gen_dummy(&template, position, size, checksum).map_err(|e| match e {
        CodecError::GapTooSmall { size, min } => WriterError::GapTooSmall {
            position,
            size,
            min,
        },
        other => WriterError::Codec(other),
    })
}
