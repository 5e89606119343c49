//! # Relaylog Binlog
//!
//! Binlog v4 event model for the relaylog workspace.
//!
//! This crate provides the immutable event representation consumed by relay
//! writers, together with the pieces needed around it:
//!
//! - **Header and types**: [`EventHeader`], [`EventType`], `LOG_EVENT_*` flags
//! - **Events**: [`BinlogEvent`] with its raw bytes and a closed [`EventKind`]
//!   dispatch view (format description, rotate, fake rotate, padding, generic)
//! - **Generators**: `gen_*` functions and [`EventGenerator`] for producing
//!   well-formed event sequences
//! - **Dummy events**: [`gen_dummy`] fills a hole with one event of an exact size
//! - **Filenames**: [`verify_filename`] and [`BinlogFilename`]
//!
//! ## Example
//!
//! ```rust
//! use relaylog_binlog::{gen_format_description, ChecksumAlgorithm, EventHeader, EventKind};
//!
//! let header = EventHeader::new(1_700_000_000, 11, 0);
//! let fde = gen_format_description(&header, 4, ChecksumAlgorithm::Crc32).unwrap();
//! assert!(matches!(fde.kind(), EventKind::FormatDescription(_)));
//! assert_eq!(fde.header.log_pos, 4 + fde.raw.len() as u32);
//! ```

pub mod dummy;
pub mod error;
pub mod event;
pub mod filename;
pub mod generate;
pub mod header;
pub mod parser;

pub use dummy::{gen_dummy, min_dummy_event_len, MIN_QUERY_EVENT_LEN, MIN_USER_VAR_EVENT_LEN};
pub use error::CodecError;
pub use event::{
    decode_event, BinlogEvent, EventBody, EventKind, FormatDescriptionBody, QueryBody, RotateBody,
    UserVarBody,
};
pub use filename::{verify_filename, BinlogFilename};
pub use generate::{
    gen_format_description, gen_previous_gtids, gen_query, gen_rotate, gen_rows, gen_xid,
    EventGenerator,
};
pub use header::{
    verify_checksum, ChecksumAlgorithm, EventHeader, EventType, BINLOG_MAGIC, CRC32_LEN,
    EVENT_HEADER_LEN, LOG_EVENT_ARTIFICIAL_F, LOG_EVENT_BINLOG_IN_USE_F, LOG_EVENT_RELAY_LOG_F,
    LOG_EVENT_SUPPRESS_USE_F, LOG_EVENT_THREAD_SPECIFIC_F,
};
pub use parser::{check_magic, parse_file_bytes};
