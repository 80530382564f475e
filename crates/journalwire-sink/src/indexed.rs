//! Indexed journal write-path
//!
//! Applies the replication stream to an indexed journal. The invariant is
//! strict index continuity: every data frame's index must equal the
//! journal's size at the moment it is applied, and the source's block
//! padding is replayed locally (an excerpt of `data_block_size - 1` never
//! fits a block remainder, so the appender emits the same padding entry
//! the source did). Any violation is stream corruption, not something to
//! retry.

use std::sync::Arc;

use journalwire_core::frame::{self, FrameHeader, FrameKind, HEADER_LEN};
use journalwire_core::journal::{IndexedAppender, IndexedJournal};
use tracing::warn;

use crate::connector::SinkConnector;
use crate::error::{Error, Result};

/// Outcome of one frame-apply attempt.
pub(crate) enum Step {
    /// Nothing new on the wire (heartbeat, idle socket, sink closed).
    Idle,
    /// One record (or padding entry) landed in the journal.
    Applied,
    /// A frame was consumed without visible progress; read again.
    Retry,
}

pub(crate) struct IndexedSinkWriter {
    journal: Arc<dyn IndexedJournal>,
    appender: Box<dyn IndexedAppender>,
    connector: SinkConnector,
}

impl IndexedSinkWriter {
    pub fn new(journal: Arc<dyn IndexedJournal>, connector: SinkConnector) -> Self {
        let appender = journal.create_appender();
        Self {
            journal,
            appender,
            connector,
        }
    }

    /// Pull from the source until one record lands locally (`true`) or the
    /// stream is idle (`false`). Reconnects and resends the resume request
    /// whenever the socket is down; transient I/O failures close the
    /// socket and report progress so the next call resumes from
    /// `last_written_index`.
    pub async fn replicate_next(&mut self) -> Result<bool> {
        if !self.connector.is_open() {
            if !self.connector.open().await {
                return Ok(false);
            }
            let last = self.journal.last_written_index();
            let request = frame::encode_resume_request(last);
            if !self.connector.write_all(&request).await {
                return Ok(false);
            }
        }

        loop {
            match self.read_next_record().await {
                Ok(Step::Idle) => return Ok(false),
                Ok(Step::Applied) => return Ok(true),
                Ok(Step::Retry) => continue,
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "lost connection to source, retrying");
                    self.connector.close();
                    return Ok(true);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn read_next_record(&mut self) -> Result<Step> {
        if !self.connector.fill(HEADER_LEN, HEADER_LEN + 8).await? {
            return Ok(Step::Idle);
        }
        let Some(header) = FrameHeader::decode(self.connector.buffered()) else {
            return Ok(Step::Idle);
        };
        self.connector.consume(HEADER_LEN);

        match header.kind()? {
            FrameKind::InSync => Ok(Step::Idle),
            FrameKind::Padded => {
                self.appender
                    .start_excerpt(self.journal.data_block_size() - 1);
                Ok(Step::Applied)
            }
            FrameKind::SyncIdx => Ok(Step::Retry),
            FrameKind::Data(size) => {
                let expected = self.journal.size();
                if header.index != expected {
                    return Err(Error::IndexMismatch {
                        expected,
                        found: header.index,
                    });
                }

                self.appender.start_excerpt(size);
                let appender = &mut self.appender;
                self.connector
                    .drain_payload(size, |chunk| appender.write(chunk))
                    .await?;
                self.appender.finish();
                Ok(Step::Applied)
            }
        }
    }

    pub fn close(&mut self) {
        self.connector.close();
    }
}
