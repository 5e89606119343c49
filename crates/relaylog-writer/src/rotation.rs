//! Rotation handling
//!
//! A real rotate is the last event of a file: it is written through the
//! normal position checks and the file is then sealed. A fake rotate is
//! never written and only changes which file the next write targets.

use relaylog_binlog::{BinlogEvent, RotateBody};
use tracing::info;

use crate::config::WriterConfig;
use crate::error::WriterError;
use crate::file_writer::WriterState;
use crate::{IgnoreReason, WriteResult};

impl WriterState {
    pub(crate) fn handle_fake_rotate(&mut self, rotate: &RotateBody) -> WriteResult {
        info!(
            from = %self.filename,
            to = %rotate.next_log_name,
            position = rotate.position,
            "Fake rotate, retargeting relay log"
        );
        self.filename = rotate.next_log_name.clone();
        WriteResult::ignored(IgnoreReason::FakeRotate)
    }

    pub(crate) async fn handle_rotate(
        &mut self,
        config: &WriterConfig,
        event: &BinlogEvent,
        rotate: &RotateBody,
    ) -> Result<WriteResult, WriterError> {
        if self.session.is_none() {
            return Err(WriterError::FileNotOpened(format!(
                "rotate to {} before any event was written to {:?}",
                rotate.next_log_name, self.filename
            )));
        }

        let result = self.place(config, event).await?;
        if !result.is_ignored() {
            if let Some(session) = self.session.as_mut() {
                session.seal().await?;
            }
        }

        info!(
            from = %self.filename,
            to = %rotate.next_log_name,
            position = rotate.position,
            ignored = result.is_ignored(),
            "Rotated relay log"
        );
        self.filename = rotate.next_log_name.clone();
        Ok(result)
    }
}
