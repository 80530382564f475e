//! Memory tailer
//!
//! Read-side handle with no local journal: the receive buffer itself is
//! the record storage. After a successful `advance` the current record is
//! the front slice of the buffer, exposed zero-copy through `payload`;
//! `finish` is the single point where the cursor moves past it. Refills
//! only ever happen at the head of `advance`/`seek`, never while an
//! unfinished view is out — and because `payload` borrows the tailer, the
//! borrow checker will not let a view outlive the next advancing call.
//!
//! Positioning goes over the wire: `seek` writes the resume request and
//! waits for the source's acknowledgement, stepping over any data frames
//! still in flight from the previous position.

use journalwire_core::frame::{self, FrameHeader, FrameKind, FROM_END, FROM_START, HEADER_LEN};
use tracing::warn;

use crate::connector::SinkConnector;
use crate::error::Result;

pub(crate) struct MemoryTailer {
    connector: SinkConnector,
    index: i64,
    last_size: usize,
    finished: bool,
}

/// One step of the positioning handshake: `Some(done)` ends it, `None`
/// means a stale data frame was stepped over.
enum Positioning {
    Done(bool),
    SkippedData,
}

impl MemoryTailer {
    pub fn new(connector: SinkConnector) -> Self {
        Self {
            connector,
            index: -1,
            last_size: 0,
            finished: true,
        }
    }

    /// Position at `index` (`FROM_START`/`FROM_END`/`k >= 0`): send the
    /// resume request, then read until the source acknowledges or a
    /// control frame aborts the attempt.
    pub async fn seek(&mut self, index: i64) -> Result<bool> {
        self.index = index;
        self.last_size = 0;
        self.finished = true;

        if !self.connector.is_open() && !self.connector.open().await {
            return Ok(false);
        }
        let request = frame::encode_resume_request(index);
        if !self.connector.write_all(&request).await {
            return Ok(false);
        }

        loop {
            match self.position_step(index).await {
                Ok(Positioning::Done(done)) => return Ok(done),
                Ok(Positioning::SkippedData) => continue,
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "connection lost while positioning");
                    self.connector.close();
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn position_step(&mut self, requested: i64) -> Result<Positioning> {
        if !self.connector.fill(HEADER_LEN, HEADER_LEN).await? {
            return Ok(Positioning::Done(false));
        }
        let Some(header) = FrameHeader::decode(self.connector.buffered()) else {
            return Ok(Positioning::Done(false));
        };
        self.connector.consume(HEADER_LEN);

        match header.kind()? {
            FrameKind::SyncIdx => {
                let done = match requested {
                    FROM_START => header.index == FROM_START,
                    FROM_END => self.advance_and_finish().await?,
                    k => header.index == k && self.advance_and_finish().await?,
                };
                Ok(Positioning::Done(done))
            }
            FrameKind::InSync | FrameKind::Padded => Ok(Positioning::Done(false)),
            FrameKind::Data(size) => {
                // still catching up to the requested position
                self.connector.drain_payload(size, |_| {}).await?;
                Ok(Positioning::SkippedData)
            }
        }
    }

    async fn advance_and_finish(&mut self) -> Result<bool> {
        // the connector is open at this point, so no repositioning can
        // re-enter seek
        match self.try_advance().await {
            Ok(true) => {
                self.finish();
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) if e.is_transient() => {
                warn!(error = %e, "connection lost mid-stream");
                self.connector.close();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Expose the next data record from the stream; `false` on heartbeats,
    /// control frames, a closed sink, or connection loss (the next call
    /// reconnects and repositions at the current index).
    pub async fn advance(&mut self) -> Result<bool> {
        if !self.connector.is_open() {
            return self.seek(self.index).await;
        }

        match self.try_advance().await {
            Ok(available) => Ok(available),
            Err(e) if e.is_transient() => {
                warn!(error = %e, "connection lost mid-stream");
                self.connector.close();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn try_advance(&mut self) -> Result<bool> {
        if !self.connector.fill(HEADER_LEN + 8, HEADER_LEN + 8).await? {
            return Ok(false);
        }
        let Some(header) = FrameHeader::decode(self.connector.buffered()) else {
            return Ok(false);
        };
        self.connector.consume(HEADER_LEN);

        match header.kind()? {
            FrameKind::InSync | FrameKind::Padded | FrameKind::SyncIdx => Ok(false),
            FrameKind::Data(size) => {
                if self.connector.buffered().len() < size
                    && !self.connector.fill(size, size).await?
                {
                    return Ok(false);
                }
                self.index = header.index;
                self.last_size = size;
                self.finished = false;
                Ok(true)
            }
        }
    }

    /// The current record, zero-copy out of the receive buffer. Empty
    /// once finished.
    pub fn payload(&self) -> &[u8] {
        if self.finished {
            &[]
        } else {
            &self.connector.buffered()[..self.last_size]
        }
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    /// Step the read cursor past the current record. Idempotent.
    pub fn finish(&mut self) {
        if !self.finished {
            self.connector.consume(self.last_size);
            self.finished = true;
        }
    }

    pub fn close(&mut self) {
        self.connector.close();
    }
}
