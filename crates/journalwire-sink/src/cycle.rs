//! Cycle-partitioned journal write-path
//!
//! Applies the replication stream to a cycle-partitioned journal. There is
//! no dense-index continuity to check here; instead the cycle is derived
//! from the high bits of each frame index and the journal places the
//! record within it. The one wrinkle is resumption: the source may
//! retransmit the exact record the sink last acknowledged, so a data
//! frame whose index equals the local frontier at resume time is drained
//! and discarded rather than applied twice.

use std::sync::Arc;

use journalwire_core::frame::{self, FrameHeader, FrameKind, HEADER_LEN};
use journalwire_core::journal::{CycleAppender, CycleJournal};
use tracing::warn;

use crate::connector::SinkConnector;
use crate::error::Result;
use crate::indexed::Step;

pub(crate) struct CycleSinkWriter {
    journal: Arc<dyn CycleJournal>,
    appender: Box<dyn CycleAppender>,
    connector: SinkConnector,
    /// Frontier at the last (re)connect; a data frame carrying this index
    /// is the source's recovery replay.
    last_local_index: i64,
}

impl CycleSinkWriter {
    pub fn new(journal: Arc<dyn CycleJournal>, connector: SinkConnector) -> Self {
        let appender = journal.create_appender();
        Self {
            journal,
            appender,
            connector,
            last_local_index: -1,
        }
    }

    /// Pull from the source until one record lands locally (`true`) or the
    /// stream is idle (`false`); see `IndexedSinkWriter::replicate_next`.
    pub async fn replicate_next(&mut self) -> Result<bool> {
        if !self.connector.is_open() {
            if !self.connector.open().await {
                return Ok(false);
            }
            let last = self.journal.last_index();
            let request = frame::encode_resume_request(last);
            if !self.connector.write_all(&request).await {
                return Ok(false);
            }
            self.last_local_index = last;
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
                // block padding belongs to indexed journals only
                warn!(index = header.index, "unexpected padding frame on a cycle journal");
                Ok(Step::Idle)
            }
            FrameKind::SyncIdx => Ok(Step::Retry),
            FrameKind::Data(size) => {
                if header.index == self.last_local_index {
                    // recovery replay of the record we already hold
                    self.connector.drain_payload(size, |_| {}).await?;
                    return Ok(Step::Retry);
                }

                let cycle = header.index >> self.journal.entries_for_cycle_bits();
                self.appender.start_excerpt(size, cycle);
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
