//! Active file session
//!
//! Owns the handle of the relay log file currently being appended to and
//! the write offset, which always equals the number of bytes in the file.
//! A session is opened lazily and can be sealed (handle released) while
//! keeping its offset for diagnostics.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use relaylog_binlog::{
    check_magic, decode_event, ChecksumAlgorithm, EventBody, EventHeader, BINLOG_MAGIC,
    EVENT_HEADER_LEN,
};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::WriterError;

const MAGIC_LEN: u64 = BINLOG_MAGIC.len() as u64;

/// How a scan over existing events ended
enum ScanEnd {
    /// All bytes belong to complete events
    Clean,
    /// The last event is incomplete and starts at `at`
    Torn { at: u64 },
}

pub(crate) struct FileSession {
    filename: String,
    path: PathBuf,
    file: Option<File>,
    offset: u64,
    first_event: Option<Bytes>,
    checksum: ChecksumAlgorithm,
}

impl FileSession {
    /// Open `path`, creating it with the magic header if absent or empty
    ///
    /// An existing file is resumed: its offset is restored from disk and its
    /// first event is remembered. A torn trailing event is truncated when
    /// `recover_torn_tail` is set.
    pub(crate) async fn open(
        path: PathBuf,
        filename: &str,
        recover_torn_tail: bool,
        sync: bool,
    ) -> Result<Self, WriterError> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| WriterError::io(format!("open relay log file {}", path.display()), e))?;

        let len = file
            .metadata()
            .await
            .map_err(|e| WriterError::io(format!("stat relay log file {}", path.display()), e))?
            .len();

        let mut session = Self {
            filename: filename.to_string(),
            path,
            file: None,
            offset: 0,
            first_event: None,
            checksum: ChecksumAlgorithm::default(),
        };

        if len < MAGIC_LEN {
            if len > 0 {
                if !recover_torn_tail {
                    return Err(WriterError::corrupted(
                        &session.path,
                        format!("only {} bytes of the magic header present", len),
                    ));
                }
                warn!(path = %session.path.display(), len, "Truncating partial magic header");
                file.set_len(0)
                    .await
                    .map_err(|e| session.io_error("truncate partial magic header", e))?;
            }
            write_durably(&mut file, &BINLOG_MAGIC, sync)
                .await
                .map_err(|e| session.io_error("write binlog magic header", e))?;
            session.offset = MAGIC_LEN;
            session.file = Some(file);
            info!(path = %session.path.display(), "Created relay log file");
            return Ok(session);
        }

        let mut magic = [0u8; BINLOG_MAGIC.len()];
        file.seek(SeekFrom::Start(0))
            .await
            .map_err(|e| session.io_error("seek to magic header", e))?;
        file.read_exact(&mut magic)
            .await
            .map_err(|e| session.io_error("read magic header", e))?;
        check_magic(&magic).map_err(|e| WriterError::corrupted(&session.path, e.to_string()))?;

        let (end, scan) = session.scan_events(&mut file, len).await?;
        if let ScanEnd::Torn { at } = scan {
            if !recover_torn_tail {
                return Err(WriterError::corrupted(
                    &session.path,
                    format!("incomplete event at offset {} (file size {})", at, len),
                ));
            }
            warn!(
                path = %session.path.display(),
                from = len,
                to = at,
                "Truncating incomplete trailing event"
            );
            file.set_len(at)
                .await
                .map_err(|e| session.io_error("truncate incomplete trailing event", e))?;
        }

        session.offset = end;
        session.file = Some(file);
        info!(
            path = %session.path.display(),
            offset = end,
            checksum = ?session.checksum,
            "Resumed relay log file"
        );
        Ok(session)
    }

    /// Walk event headers from the magic header to the end of the file
    async fn scan_events(
        &mut self,
        file: &mut File,
        len: u64,
    ) -> Result<(u64, ScanEnd), WriterError> {
        let mut offset = MAGIC_LEN;
        let mut header = [0u8; EVENT_HEADER_LEN];

        while offset < len {
            if offset + EVENT_HEADER_LEN as u64 > len {
                return Ok((offset, ScanEnd::Torn { at: offset }));
            }
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| self.io_error("seek to event header", e))?;
            file.read_exact(&mut header)
                .await
                .map_err(|e| self.io_error("read event header", e))?;
            let size = EventHeader::decode(&header)?.event_size as u64;
            if size < EVENT_HEADER_LEN as u64 {
                return Err(WriterError::corrupted(
                    &self.path,
                    format!("event at offset {} declares size {}", offset, size),
                ));
            }
            if offset + size > len {
                return Ok((offset, ScanEnd::Torn { at: offset }));
            }

            if self.first_event.is_none() {
                let mut raw = vec![0u8; size as usize];
                file.seek(SeekFrom::Start(offset))
                    .await
                    .map_err(|e| self.io_error("seek to first event", e))?;
                file.read_exact(&mut raw)
                    .await
                    .map_err(|e| self.io_error("read first event", e))?;
                self.remember_first_event(Bytes::from(raw));
            }
            offset += size;
        }

        Ok((offset, ScanEnd::Clean))
    }

    fn remember_first_event(&mut self, raw: Bytes) {
        if let Ok(ev) = decode_event(raw.clone(), self.checksum) {
            if let EventBody::FormatDescription(fde) = &ev.body {
                self.checksum = fde.checksum;
            }
        }
        self.first_event = Some(raw);
    }

    /// Append the given encoded events as one write
    ///
    /// On failure the file is cut back to the previous offset so that the
    /// offset keeps matching the bytes on disk.
    pub(crate) async fn append(&mut self, events: &[&[u8]], sync: bool) -> Result<(), WriterError> {
        let Some(file) = self.file.as_mut() else {
            return Err(WriterError::FileNotOpened(format!(
                "relay log file {} is closed",
                self.filename
            )));
        };

        let total: usize = events.iter().map(|e| e.len()).sum();
        let mut buf = Vec::with_capacity(total);
        for event in events {
            buf.extend_from_slice(event);
        }

        if let Err(e) = write_durably(file, &buf, sync).await {
            if let Err(trunc) = file.set_len(self.offset).await {
                warn!(
                    path = %self.path.display(),
                    offset = self.offset,
                    error = %trunc,
                    "Failed to roll back partial write"
                );
            }
            return Err(self.io_error(&format!("write {} bytes", total), e));
        }

        if self.offset == MAGIC_LEN {
            if let Some(first) = events.first() {
                self.remember_first_event(Bytes::copy_from_slice(first));
            }
        }
        self.offset += total as u64;
        debug!(offset = self.offset, bytes = total, "Appended to relay log file");
        Ok(())
    }

    /// Release the file handle after syncing it; idempotent
    pub(crate) async fn seal(&mut self) -> Result<(), WriterError> {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.sync_all().await {
                let err = self.io_error("sync relay log file", e);
                self.file = Some(file);
                return Err(err);
            }
            debug!(path = %self.path.display(), offset = self.offset, "Closed relay log file");
        }
        Ok(())
    }

    /// Read `[start, end)` from the file at `path`
    ///
    /// Returns `None` when the file is shorter than `end`. A missing file is
    /// an I/O error.
    pub(crate) async fn read_range(
        path: &Path,
        start: u64,
        end: u64,
    ) -> Result<Option<Vec<u8>>, WriterError> {
        let context = |what: &str| format!("{} relay log file {}", what, path.display());
        let mut file = File::open(path)
            .await
            .map_err(|e| WriterError::io(context("open"), e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| WriterError::io(context("stat"), e))?
            .len();
        if len < end {
            return Ok(None);
        }
        let mut buf = vec![0u8; (end - start) as usize];
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| WriterError::io(context("seek"), e))?;
        file.read_exact(&mut buf)
            .await
            .map_err(|e| WriterError::io(context("read"), e))?;
        Ok(Some(buf))
    }

    /// Whether `path` holds anything past the magic header
    ///
    /// A missing file holds nothing.
    pub(crate) async fn has_events(path: &Path) -> Result<bool, WriterError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.len() > MAGIC_LEN),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(WriterError::io(
                format!("stat relay log file {}", path.display()),
                e,
            )),
        }
    }

    pub(crate) fn filename(&self) -> &str {
        &self.filename
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// First event stored in the file, normally its format description
    pub(crate) fn first_event(&self) -> Option<&Bytes> {
        self.first_event.as_ref()
    }

    /// Checksum algorithm announced by the file's format description
    pub(crate) fn checksum(&self) -> ChecksumAlgorithm {
        self.checksum
    }

    fn io_error(&self, what: &str, source: std::io::Error) -> WriterError {
        WriterError::io(format!("{} in {}", what, self.path.display()), source)
    }
}

async fn write_durably(file: &mut File, buf: &[u8], sync: bool) -> std::io::Result<()> {
    file.write_all(buf).await?;
    file.flush().await?;
    if sync {
        file.sync_data().await?;
    }
    Ok(())
}
