//! Event generators
//!
//! Each generator takes a template header (timestamp, server id, flags) and
//! the start offset `latest_pos`, and returns a complete event whose
//! `event_size` and `log_pos` are filled in.

use bytes::Bytes;
use chrono::Utc;

use crate::error::CodecError;
use crate::event::{decode_event, BinlogEvent, SERVER_VERSION_LEN};
use crate::header::{
    append_checksum, ChecksumAlgorithm, EventHeader, EventType, BINLOG_MAGIC, EVENT_HEADER_LEN,
};

/// Server version announced by generated format description events
pub const GENERATED_SERVER_VERSION: &str = "5.7.22-log";

/// Post-header lengths for event types 1..=38 (MySQL 5.7)
pub const POST_HEADER_LENS: [u8; 38] = [
    56, 13, 0, 8, 0, 18, 0, 4, 4, 4, 4, 18, 0, 0, 95, 0, 4, 26, 8, 0, 0, 0, 8, 8, 8, 2, 0, 0, 0,
    10, 10, 10, 42, 42, 0, 18, 52, 0,
];

/// Encode `body` behind a header derived from `template` and decode the result
pub(crate) fn assemble(
    template: &EventHeader,
    event_type: EventType,
    latest_pos: u32,
    body: &[u8],
    checksum: ChecksumAlgorithm,
) -> Result<BinlogEvent, CodecError> {
    let size = EVENT_HEADER_LEN + body.len() + checksum.trailer_len();
    let event_size = u32::try_from(size)
        .map_err(|_| CodecError::invalid_body("event", format!("event of {} bytes", size)))?;
    let log_pos = latest_pos.checked_add(event_size).ok_or_else(|| {
        CodecError::invalid_body(
            "event",
            format!("end position {} + {} overflows", latest_pos, event_size),
        )
    })?;

    let header = EventHeader {
        event_type,
        event_size,
        log_pos,
        ..*template
    };
    let mut buf = Vec::with_capacity(size);
    header.encode(&mut buf);
    buf.extend_from_slice(body);
    append_checksum(&mut buf, checksum);

    decode_event(Bytes::from(buf), checksum)
}

/// Generate a format description event
pub fn gen_format_description(
    template: &EventHeader,
    latest_pos: u32,
    checksum: ChecksumAlgorithm,
) -> Result<BinlogEvent, CodecError> {
    let mut body = Vec::with_capacity(2 + SERVER_VERSION_LEN + 4 + 1 + POST_HEADER_LENS.len() + 1);
    body.extend_from_slice(&4u16.to_le_bytes());
    let mut version = [0u8; SERVER_VERSION_LEN];
    version[..GENERATED_SERVER_VERSION.len()].copy_from_slice(GENERATED_SERVER_VERSION.as_bytes());
    body.extend_from_slice(&version);
    body.extend_from_slice(&template.timestamp.to_le_bytes());
    body.push(EVENT_HEADER_LEN as u8);
    body.extend_from_slice(&POST_HEADER_LENS);
    body.push(checksum.as_byte());

    assemble(template, EventType::FormatDescription, latest_pos, &body, checksum)
}

/// Generate a rotate event pointing at `next_log_name`
///
/// A template with a zero timestamp produces a fake rotate event.
pub fn gen_rotate(
    template: &EventHeader,
    latest_pos: u32,
    next_log_name: &str,
    position: u64,
    checksum: ChecksumAlgorithm,
) -> Result<BinlogEvent, CodecError> {
    let mut body = Vec::with_capacity(8 + next_log_name.len());
    body.extend_from_slice(&position.to_le_bytes());
    body.extend_from_slice(next_log_name.as_bytes());
    assemble(template, EventType::Rotate, latest_pos, &body, checksum)
}

/// Generate a query event
pub fn gen_query(
    template: &EventHeader,
    latest_pos: u32,
    thread_id: u32,
    status_vars: &[u8],
    schema: &[u8],
    query: &[u8],
    checksum: ChecksumAlgorithm,
) -> Result<BinlogEvent, CodecError> {
    let schema_len = u8::try_from(schema.len())
        .map_err(|_| CodecError::invalid_body("Query", "schema longer than 255 bytes"))?;
    let status_len = u16::try_from(status_vars.len())
        .map_err(|_| CodecError::invalid_body("Query", "status vars longer than 65535 bytes"))?;

    let mut body = Vec::with_capacity(13 + status_vars.len() + schema.len() + 1 + query.len());
    body.extend_from_slice(&thread_id.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // exec time
    body.push(schema_len);
    body.extend_from_slice(&0u16.to_le_bytes()); // error code
    body.extend_from_slice(&status_len.to_le_bytes());
    body.extend_from_slice(status_vars);
    body.extend_from_slice(schema);
    body.push(0);
    body.extend_from_slice(query);

    assemble(template, EventType::Query, latest_pos, &body, checksum)
}

/// Generate an XID (transaction commit) event
pub fn gen_xid(
    template: &EventHeader,
    latest_pos: u32,
    xid: u64,
    checksum: ChecksumAlgorithm,
) -> Result<BinlogEvent, CodecError> {
    assemble(template, EventType::Xid, latest_pos, &xid.to_le_bytes(), checksum)
}

/// Generate an empty previous-GTIDs event
pub fn gen_previous_gtids(
    template: &EventHeader,
    latest_pos: u32,
    checksum: ChecksumAlgorithm,
) -> Result<BinlogEvent, CodecError> {
    assemble(template, EventType::PreviousGtids, latest_pos, &0u64.to_le_bytes(), checksum)
}

/// Generate a v2 write-rows event carrying an opaque row image
pub fn gen_rows(
    template: &EventHeader,
    latest_pos: u32,
    table_id: u64,
    rows: &[u8],
    checksum: ChecksumAlgorithm,
) -> Result<BinlogEvent, CodecError> {
    let mut body = Vec::with_capacity(10 + rows.len());
    body.extend_from_slice(&table_id.to_le_bytes()[..6]);
    body.extend_from_slice(&0u16.to_le_bytes()); // flags
    body.extend_from_slice(&2u16.to_le_bytes()); // extra data length
    body.extend_from_slice(rows);
    assemble(template, EventType::WriteRowsV2, latest_pos, &body, checksum)
}

/// Stateful generator producing contiguous event sequences
///
/// Tracks the end position of the last generated event so successive
/// batches can be concatenated into a valid file.
#[derive(Debug, Clone)]
pub struct EventGenerator {
    server_id: u32,
    latest_pos: u32,
    next_xid: u64,
    checksum: ChecksumAlgorithm,
}

impl EventGenerator {
    /// Create a generator starting at `latest_pos`
    pub fn new(server_id: u32, latest_pos: u32, next_xid: u64, checksum: ChecksumAlgorithm) -> Self {
        Self {
            server_id,
            latest_pos,
            next_xid,
            checksum,
        }
    }

    /// End position of the last generated event
    pub fn latest_pos(&self) -> u32 {
        self.latest_pos
    }

    fn template(&self) -> EventHeader {
        EventHeader::new(Utc::now().timestamp() as u32, self.server_id, 0)
    }

    fn push(
        &mut self,
        event: BinlogEvent,
        events: &mut Vec<BinlogEvent>,
        data: &mut Vec<u8>,
    ) {
        self.latest_pos = event.header.log_pos;
        data.extend_from_slice(&event.raw);
        events.push(event);
    }

    /// Magic header, format description and previous-GTIDs of a new file
    ///
    /// Resets the position to the start of a file. The returned bytes
    /// include the magic header.
    pub fn gen_file_header(&mut self) -> Result<(Vec<BinlogEvent>, Vec<u8>), CodecError> {
        self.latest_pos = BINLOG_MAGIC.len() as u32;
        let mut events = Vec::with_capacity(2);
        let mut data = BINLOG_MAGIC.to_vec();

        let template = self.template();
        let fde = gen_format_description(&template, self.latest_pos, self.checksum)?;
        self.push(fde, &mut events, &mut data);
        let gtids = gen_previous_gtids(&template, self.latest_pos, self.checksum)?;
        self.push(gtids, &mut events, &mut data);

        Ok((events, data))
    }

    /// A DDL statement as a single query event
    pub fn gen_ddl(
        &mut self,
        schema: &str,
        query: &str,
    ) -> Result<(Vec<BinlogEvent>, Vec<u8>), CodecError> {
        let mut events = Vec::with_capacity(1);
        let mut data = Vec::new();
        let ev = gen_query(
            &self.template(),
            self.latest_pos,
            0,
            b"",
            schema.as_bytes(),
            query.as_bytes(),
            self.checksum,
        )?;
        self.push(ev, &mut events, &mut data);
        Ok((events, data))
    }

    /// A DML transaction: BEGIN, one rows event per row image, then XID
    pub fn gen_dml(
        &mut self,
        schema: &str,
        table_id: u64,
        rows: &[Vec<u8>],
    ) -> Result<(Vec<BinlogEvent>, Vec<u8>), CodecError> {
        let mut events = Vec::with_capacity(rows.len() + 2);
        let mut data = Vec::new();
        let template = self.template();

        let begin = gen_query(
            &template,
            self.latest_pos,
            0,
            b"",
            schema.as_bytes(),
            b"BEGIN",
            self.checksum,
        )?;
        self.push(begin, &mut events, &mut data);
        for row in rows {
            let ev = gen_rows(&template, self.latest_pos, table_id, row, self.checksum)?;
            self.push(ev, &mut events, &mut data);
        }
        let xid = gen_xid(&template, self.latest_pos, self.next_xid, self.checksum)?;
        self.next_xid += 1;
        self.push(xid, &mut events, &mut data);

        Ok((events, data))
    }
}
