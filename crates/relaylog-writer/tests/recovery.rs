//! Resume and recovery tests
//!
//! A writer restarted over an existing relay directory must pick up the
//! files exactly where the previous writer left them.

use std::path::PathBuf;

use relaylog_binlog::{
    gen_format_description, gen_query, min_dummy_event_len, parse_file_bytes, ChecksumAlgorithm,
    EventGenerator, EventHeader, EventType,
};
use relaylog_writer::{FileWriter, IgnoreReason, Writer, WriterConfig, WriterError};
use tempfile::TempDir;

const SOURCE_ID: &str = "source-1";
const FILENAME: &str = "mysql-bin.000007";

fn setup() -> (TempDir, PathBuf) {
    relaylog_logging::init_testing();
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join(SOURCE_ID)).unwrap();
    let file = temp.path().join(SOURCE_ID).join(FILENAME);
    (temp, file)
}

async fn open_writer(config: WriterConfig) -> FileWriter {
    let w = FileWriter::new(config);
    w.init(SOURCE_ID, FILENAME).await.unwrap();
    w
}

fn header() -> EventHeader {
    EventHeader::new(1_700_000_000, 21, 0)
}

#[tokio::test]
async fn test_resume_after_restart() {
    let (temp, file) = setup();
    let _ctx = relaylog_logging::SourceContextGuard::new(SOURCE_ID);
    let mut generator = EventGenerator::new(21, 0, 1, ChecksumAlgorithm::Crc32);
    let (file_header, mut expected) = generator.gen_file_header().unwrap();
    let (ddl, data) = generator.gen_ddl("db", "CREATE TABLE `db`.`t` (id INT)").unwrap();
    expected.extend(data);
    let (dml, data) = generator
        .gen_dml("db", 3, &[vec![1, 0, 0, 0], vec![2, 0, 0, 0]])
        .unwrap();
    expected.extend(data);

    {
        let w = open_writer(WriterConfig::new(temp.path())).await;
        for ev in file_header.iter().chain(&ddl) {
            w.write_event(ev).await.unwrap();
        }
        w.close().await.unwrap();
    }

    let w = open_writer(WriterConfig::new(temp.path())).await;

    // upstream reconnects and replays from the start of the file
    let result = w.write_event(&file_header[0]).await.unwrap();
    assert_eq!(result.ignore_reason(), IgnoreReason::AlreadyExists);
    for ev in file_header[1..].iter().chain(&ddl) {
        let result = w.write_event(ev).await.unwrap();
        assert_eq!(result.ignore_reason(), IgnoreReason::AlreadyExists);
    }
    for ev in &dml {
        let result = w.write_event(ev).await.unwrap();
        assert!(!result.is_ignored());
    }

    assert_eq!(w.offset(), expected.len() as u64);
    assert_eq!(std::fs::read(&file).unwrap(), expected);
}

#[tokio::test]
async fn test_write_after_close_reopens() {
    let (temp, file) = setup();
    let fde = gen_format_description(&header(), 4, ChecksumAlgorithm::Crc32).unwrap();
    let query = gen_query(
        &header(),
        fde.header.log_pos,
        0,
        b"",
        b"db",
        b"BEGIN",
        ChecksumAlgorithm::Crc32,
    )
    .unwrap();

    let w = open_writer(WriterConfig::new(temp.path())).await;
    w.write_event(&fde).await.unwrap();
    w.close().await.unwrap();
    assert!(!w.status().file_open);

    let result = w.write_event(&query).await.unwrap();
    assert!(!result.is_ignored());
    assert!(w.status().file_open);
    assert_eq!(w.offset(), query.header.log_pos as u64);

    let events = parse_file_bytes(&std::fs::read(&file).unwrap()).unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_torn_tail_recovered() {
    let (temp, file) = setup();
    let fde = gen_format_description(&header(), 4, ChecksumAlgorithm::Crc32).unwrap();
    let query = gen_query(
        &header(),
        fde.header.log_pos,
        0,
        b"",
        b"db",
        b"BEGIN",
        ChecksumAlgorithm::Crc32,
    )
    .unwrap();

    // crash in the middle of writing the query
    let mut data = b"\xfebin".to_vec();
    data.extend_from_slice(&fde.raw);
    data.extend_from_slice(&query.raw[..query.len() / 2]);
    std::fs::write(&file, &data).unwrap();

    let w = open_writer(WriterConfig::new(temp.path())).await;
    let result = w.write_event(&fde).await.unwrap();
    assert_eq!(result.ignore_reason(), IgnoreReason::AlreadyExists);
    assert_eq!(w.offset(), fde.header.log_pos as u64);

    let result = w.write_event(&query).await.unwrap();
    assert!(!result.is_ignored());
    let events = parse_file_bytes(&std::fs::read(&file).unwrap()).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].raw, query.raw);
}

#[tokio::test]
async fn test_torn_tail_reported_without_recovery() {
    let (temp, file) = setup();
    let fde = gen_format_description(&header(), 4, ChecksumAlgorithm::Crc32).unwrap();
    let mut data = b"\xfebin".to_vec();
    data.extend_from_slice(&fde.raw[..fde.len() - 1]);
    std::fs::write(&file, &data).unwrap();

    let config = WriterConfig::new(temp.path()).with_recover_torn_tail(false);
    let w = open_writer(config).await;
    let err = w.write_event(&fde).await.unwrap_err();
    assert!(matches!(err, WriterError::Corrupted { .. }), "{}", err);

    // nothing was cut
    assert_eq!(std::fs::read(&file).unwrap(), data);
}

#[tokio::test]
async fn test_partial_magic_header_recovered() {
    let (temp, file) = setup();
    std::fs::write(&file, b"\xfeb").unwrap();
    let fde = gen_format_description(&header(), 4, ChecksumAlgorithm::Crc32).unwrap();

    let w = open_writer(WriterConfig::new(temp.path())).await;
    let result = w.write_event(&fde).await.unwrap();
    assert!(!result.is_ignored());
    assert_eq!(w.offset(), fde.header.log_pos as u64);
}

#[tokio::test]
async fn test_checksum_off_hole_floor() {
    let (temp, file) = setup();
    let fde = gen_format_description(&header(), 4, ChecksumAlgorithm::Off).unwrap();
    let floor = min_dummy_event_len(ChecksumAlgorithm::Off);
    assert_eq!(floor, 25);

    let w = open_writer(WriterConfig::new(temp.path())).await;
    w.write_event(&fde).await.unwrap();

    let too_close = gen_query(
        &header(),
        fde.header.log_pos + floor - 1,
        0,
        b"",
        b"db",
        b"BEGIN",
        ChecksumAlgorithm::Off,
    )
    .unwrap();
    let err = w.write_event(&too_close).await.unwrap_err();
    assert!(matches!(err, WriterError::GapTooSmall { min: 25, .. }), "{}", err);

    let query = gen_query(
        &header(),
        fde.header.log_pos + floor,
        0,
        b"",
        b"db",
        b"BEGIN",
        ChecksumAlgorithm::Off,
    )
    .unwrap();
    w.write_event(&query).await.unwrap();

    let events = parse_file_bytes(&std::fs::read(&file).unwrap()).unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].header.event_type, EventType::UserVar);
    assert_eq!(events[1].header.event_size, floor);
}

#[tokio::test]
async fn test_config_from_toml_file() {
    let (temp, _) = setup();
    let config_path = temp.path().join("relaylog.toml");
    let text = format!(
        "relay_dir = {:?}\nsync_on_write = false\n",
        temp.path().display().to_string()
    );
    std::fs::write(&config_path, text).unwrap();

    let config = WriterConfig::load(&config_path).unwrap();
    assert!(!config.sync_on_write);
    assert!(config.recover_torn_tail);

    let fde = gen_format_description(&header(), 4, ChecksumAlgorithm::Crc32).unwrap();
    let w = open_writer(config).await;
    assert!(!w.write_event(&fde).await.unwrap().is_ignored());
}
