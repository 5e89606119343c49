//! File-backed relay writer

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use relaylog_binlog::{verify_filename, BinlogEvent, EventKind, EVENT_HEADER_LEN};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::WriterConfig;
use crate::error::WriterError;
use crate::hole;
use crate::position::{classify, compare_stored, DuplicateCheck, Placement};
use crate::session::FileSession;
use crate::{IgnoreReason, WriteResult, Writer, WriterStatus};

/// Writes events into `relay_dir/<source_id>/<filename>`
pub struct FileWriter {
    config: WriterConfig,
    state: Mutex<WriterState>,
    status: RwLock<WriterStatus>,
}

/// Everything guarded by the write path
#[derive(Default)]
pub(crate) struct WriterState {
    pub(crate) source_id: Option<String>,
    pub(crate) filename: String,
    pub(crate) session: Option<FileSession>,
}

impl FileWriter {
    /// Create a writer; nothing is opened until the first event arrives
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            state: Mutex::new(WriterState::default()),
            status: RwLock::new(WriterStatus::default()),
        }
    }

    /// Writer configuration
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    fn publish(&self, state: &WriterState) {
        *self.status.write() = state.snapshot();
    }
}

#[async_trait]
impl Writer for FileWriter {
    #[instrument(skip(self))]
    async fn init(&self, source_id: &str, filename: &str) -> Result<(), WriterError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = &state.source_id {
            return Err(WriterError::AlreadyInitialized(existing.clone()));
        }
        if !filename.is_empty() && !verify_filename(filename) {
            warn!(filename, "Initial relay log filename is not valid");
        }

        state.source_id = Some(source_id.to_string());
        state.filename = filename.to_string();
        self.publish(&state);
        info!(relay_dir = %self.config.relay_dir.display(), "Relay writer initialized");
        Ok(())
    }

    #[instrument(
        skip(self, event),
        fields(event_type = %event.header.event_type, log_pos = event.header.log_pos)
    )]
    async fn write_event(&self, event: &BinlogEvent) -> Result<WriteResult, WriterError> {
        let mut state = self.state.lock().await;
        let result = state.write_event(&self.config, event).await;
        self.publish(&state);
        result
    }

    #[instrument(skip(self))]
    async fn close(&self) -> Result<(), WriterError> {
        let mut state = self.state.lock().await;
        let result = match state.session.as_mut() {
            Some(session) => session.seal().await,
            None => Ok(()),
        };
        self.publish(&state);
        result
    }

    fn filename(&self) -> String {
        self.status.read().filename.clone()
    }

    fn offset(&self) -> u64 {
        self.status.read().offset
    }

    fn status(&self) -> WriterStatus {
        self.status.read().clone()
    }
}

impl WriterState {
    fn snapshot(&self) -> WriterStatus {
        WriterStatus {
            source_id: self.source_id.clone(),
            filename: self.filename.clone(),
            offset: self.session.as_ref().map_or(0, FileSession::offset),
            file_open: self.session.as_ref().is_some_and(FileSession::is_open),
        }
    }

    async fn write_event(
        &mut self,
        config: &WriterConfig,
        event: &BinlogEvent,
    ) -> Result<WriteResult, WriterError> {
        if self.source_id.is_none() {
            return Err(WriterError::NotConfigured(
                "init has not been called".to_string(),
            ));
        }

        match event.kind() {
            EventKind::FakeRotate(rotate) => Ok(self.handle_fake_rotate(rotate)),
            EventKind::Rotate(rotate) => self.handle_rotate(config, event, rotate).await,
            EventKind::FormatDescription(_) => {
                self.ensure_session(config, true).await?;
                let stored = self.session.as_ref().and_then(FileSession::first_event);
                if stored == Some(&event.raw) {
                    debug!("Format description already stored");
                    return Ok(WriteResult::ignored(IgnoreReason::AlreadyExists));
                }
                self.place(config, event).await
            }
            EventKind::Padding | EventKind::Generic => {
                self.ensure_session(config, false).await?;
                self.place(config, event).await
            }
        }
    }

    /// Full path of the file the next write targets
    pub(crate) fn target_path(&self, config: &WriterConfig) -> Result<PathBuf, WriterError> {
        let source_id = self
            .source_id
            .as_deref()
            .ok_or_else(|| WriterError::NotConfigured("init has not been called".to_string()))?;
        Ok(config.relay_dir.join(source_id).join(&self.filename))
    }

    /// Make sure the session targets the current filename with an open handle
    ///
    /// Only a format description may start a file. Any other event needs a
    /// target file that already holds one, and is rejected with
    /// `FileNotOpened` before anything is created on disk.
    async fn ensure_session(
        &mut self,
        config: &WriterConfig,
        starts_file: bool,
    ) -> Result<(), WriterError> {
        if let Some(source_id) = self.source_id.as_deref() {
            validate_source_id(source_id)?;
        }
        if self.filename.is_empty() {
            return Err(WriterError::NotConfigured(
                "no relay log filename specified".to_string(),
            ));
        }
        if !verify_filename(&self.filename) {
            return Err(WriterError::InvalidFilename(self.filename.clone()));
        }

        let reusable = self
            .session
            .as_ref()
            .is_some_and(|s| s.filename() == self.filename && s.is_open());
        if !reusable {
            let path = self.target_path(config)?;
            if !starts_file && !FileSession::has_events(&path).await? {
                return Err(self.missing_format_description());
            }
            let session = FileSession::open(
                path,
                &self.filename,
                config.recover_torn_tail,
                config.sync_on_write,
            )
            .await?;
            if let Some(previous) = self.session.as_mut() {
                previous.seal().await?;
            }
            self.session = Some(session);
        }

        let has_first = self
            .session
            .as_ref()
            .is_some_and(|s| s.first_event().is_some());
        if !starts_file && !has_first {
            return Err(self.missing_format_description());
        }
        Ok(())
    }

    fn missing_format_description(&self) -> WriterError {
        WriterError::FileNotOpened(format!(
            "no format description written to {} yet",
            self.filename
        ))
    }

    /// Position-check an event against the session and write it
    pub(crate) async fn place(
        &mut self,
        config: &WriterConfig,
        event: &BinlogEvent,
    ) -> Result<WriteResult, WriterError> {
        let (start, end) = event_range(event)?;
        let path = self.target_path(config)?;
        let Some(session) = self.session.as_mut() else {
            return Err(WriterError::FileNotOpened(format!(
                "no relay log file open for {}",
                self.filename
            )));
        };
        let cur = session.offset();

        match classify(start, cur) {
            Placement::Append => {
                session.append(&[&event.raw], config.sync_on_write).await?;
                Ok(WriteResult::written())
            }
            Placement::Hole { size } => {
                // start > cur and start fits in u32
                let position = cur as u32;
                let dummy =
                    hole::synthesize(event.header.server_id, position, size, session.checksum())?;
                warn!(position, size, "Filling hole with dummy event");
                session
                    .append(&[&dummy.raw, &event.raw], config.sync_on_write)
                    .await?;
                Ok(WriteResult::written())
            }
            Placement::Overlap => check_duplicate(&path, &self.filename, start, end, cur, event).await,
        }
    }
}

/// Verify an overlapping event against the bytes stored at its range
async fn check_duplicate(
    path: &Path,
    filename: &str,
    start: u64,
    end: u64,
    cur: u64,
    event: &BinlogEvent,
) -> Result<WriteResult, WriterError> {
    let conflict = |reason: String| {
        warn!(filename, start, end, %reason, "Duplicate event conflict");
        WriterError::DuplicateConflict {
            filename: filename.to_string(),
            start,
            end,
            reason,
        }
    };

    if end > cur {
        return Err(conflict(format!(
            "event ends past the current offset {}",
            cur
        )));
    }

    let stored = FileSession::read_range(path, start, end).await?;
    match compare_stored(stored.as_deref(), &event.raw) {
        DuplicateCheck::Match => {
            debug!(start, end, "Event already stored");
            Ok(WriteResult::ignored(IgnoreReason::AlreadyExists))
        }
        DuplicateCheck::Mismatch(reason) => Err(conflict(reason)),
    }
}

/// `[start, end)` of an event, after checking its header agrees with its bytes
fn event_range(event: &BinlogEvent) -> Result<(u64, u64), WriterError> {
    let size = event.header.event_size;
    if event.raw.len() != size as usize {
        return Err(WriterError::invalid_argument(format!(
            "event declares size {} but has {} bytes",
            size,
            event.raw.len()
        )));
    }
    if (size as usize) < EVENT_HEADER_LEN {
        return Err(WriterError::invalid_argument(format!(
            "event size {} is smaller than its header",
            size
        )));
    }
    let start = event.start_pos().ok_or_else(|| {
        WriterError::invalid_argument(format!(
            "event size {} is larger than its end position {}",
            size, event.header.log_pos
        ))
    })?;
    Ok((start as u64, event.header.log_pos as u64))
}

fn validate_source_id(source_id: &str) -> Result<(), WriterError> {
    let invalid = source_id.is_empty()
        || source_id == "."
        || source_id == ".."
        || source_id.contains(['\0', '/', '\\']);
    if invalid {
        return Err(WriterError::invalid_argument(format!(
            "source id {:?} cannot be used as a directory name",
            source_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use relaylog_binlog::{gen_query, ChecksumAlgorithm, EventHeader};

    #[test]
    fn test_validate_source_id() {
        assert!(validate_source_id("3ccc475b-2343-11e7-be21-6c0b84d59f30.000001").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", "invalid\0uuid"] {
            let err = validate_source_id(bad).unwrap_err();
            assert!(err.to_string().contains("invalid argument"), "{:?}", bad);
        }
    }

    #[test]
    fn test_event_range() {
        let header = EventHeader::new(1_700_000_000, 11, 0);
        let ev = gen_query(&header, 120, 0, b"", b"db", b"BEGIN", ChecksumAlgorithm::Crc32)
            .unwrap();
        let (start, end) = event_range(&ev).unwrap();
        assert_eq!(start, 120);
        assert_eq!(end, 120 + ev.len() as u64);
    }

    #[test]
    fn test_event_range_rejects_inconsistent_event() {
        let header = EventHeader::new(1_700_000_000, 11, 0);
        let mut ev = gen_query(&header, 120, 0, b"", b"db", b"BEGIN", ChecksumAlgorithm::Crc32)
            .unwrap();
        ev.raw = Bytes::from_static(b"short");
        assert!(matches!(
            event_range(&ev),
            Err(WriterError::InvalidArgument(_))
        ));

        let mut ev = gen_query(&header, 120, 0, b"", b"db", b"BEGIN", ChecksumAlgorithm::Crc32)
            .unwrap();
        ev.header.log_pos = 10;
        assert!(matches!(
            event_range(&ev),
            Err(WriterError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_init_twice_fails() {
        let writer = FileWriter::new(WriterConfig::new("/nonexistent"));
        writer.init("src", "bin.000001").await.unwrap();
        let err = writer.init("src", "bin.000002").await.unwrap_err();
        assert!(matches!(err, WriterError::AlreadyInitialized(_)));
        assert_eq!(writer.filename(), "bin.000001");
    }

    #[tokio::test]
    async fn test_close_unconfigured() {
        let writer = FileWriter::new(WriterConfig::default());
        writer.close().await.unwrap();
        writer.close().await.unwrap();
        assert_eq!(writer.status(), WriterStatus::default());
    }
}
