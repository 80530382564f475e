//! Sink lifecycle and consumer handles
//!
//! A [`Sink`] owns the journal (if any), the configuration, and the
//! shared `closed` flag; consumers read through [`SinkHandle`]s created
//! from it. A handle is one of three variants behind a single capability
//! set — advance, seek, to_start/to_end, index, payload, finish, close —
//! chosen by the sink's mode:
//!
//! - indexed journal: replicate-then-read-locally,
//! - cycle journal: same, with replay skipping,
//! - memory: zero-copy out of the receive buffer.
//!
//! Persistent sinks admit at most one live handle; memory sinks any
//! number, each with its own connection. Sinks never accept local writes.
//!
//! ## Close semantics
//!
//! `close` is idempotent. The first call fires the shared close signal,
//! which closes every registered handle: each handle's connector holds a
//! receiver, so a reconnect loop wakes out of its sleep, a read already
//! in flight on a silent socket is interrupted, and the connector drops
//! its socket — every subsequent call on the handle reports idle. The
//! registry is then emptied and the journal closed, with its errors
//! logged, not propagated. Handles also deregister themselves on close
//! and on drop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use journalwire_core::journal::{CycleJournal, IndexedJournal, JournalTailer};
use tracing::{debug, warn};

use crate::config::SinkConfig;
use crate::connector::SinkConnector;
use crate::cycle::CycleSinkWriter;
use crate::error::{Error, Result};
use crate::indexed::IndexedSinkWriter;
use crate::shutdown::CloseSignal;
use crate::tailer::MemoryTailer;

enum JournalKind {
    Indexed(Arc<dyn IndexedJournal>),
    Cycle(Arc<dyn CycleJournal>),
}

struct Shared {
    closed: CloseSignal,
    handles: Mutex<Vec<u64>>,
    next_handle: AtomicU64,
}

/// The consuming end of a replication session to one source address.
pub struct Sink {
    journal: Option<JournalKind>,
    addr: SocketAddr,
    config: Arc<SinkConfig>,
    shared: Arc<Shared>,
}

impl Sink {
    /// Sink that persists into an indexed journal.
    pub fn indexed(
        journal: Arc<dyn IndexedJournal>,
        addr: SocketAddr,
        config: SinkConfig,
    ) -> Self {
        Self::new(Some(JournalKind::Indexed(journal)), addr, config)
    }

    /// Sink that persists into a cycle-partitioned journal.
    pub fn cycle(journal: Arc<dyn CycleJournal>, addr: SocketAddr, config: SinkConfig) -> Self {
        Self::new(Some(JournalKind::Cycle(journal)), addr, config)
    }

    /// Sink with no local persistence; records are read straight out of
    /// the receive buffer.
    pub fn memory(addr: SocketAddr, config: SinkConfig) -> Self {
        Self::new(None, addr, config)
    }

    fn new(journal: Option<JournalKind>, addr: SocketAddr, config: SinkConfig) -> Self {
        Self {
            journal,
            addr,
            config: Arc::new(config),
            shared: Arc::new(Shared {
                closed: CloseSignal::new(),
                handles: Mutex::new(Vec::new()),
                next_handle: AtomicU64::new(0),
            }),
        }
    }

    /// Random-access read handle. On a persistent sink this fails if any
    /// handle is already live.
    pub fn create_excerpt(&self) -> Result<SinkHandle> {
        self.create_handle()
    }

    /// Sequential read handle. Same single-handle rule as
    /// [`Sink::create_excerpt`].
    pub fn create_tailer(&self) -> Result<SinkHandle> {
        self.create_handle()
    }

    /// Sinks are read-only; this always fails.
    pub fn create_appender(&self) -> Result<SinkHandle> {
        Err(Error::AppendUnsupported)
    }

    fn create_handle(&self) -> Result<SinkHandle> {
        let kind = match &self.journal {
            None => HandleKind::Memory(MemoryTailer::new(self.connector())),
            Some(JournalKind::Indexed(journal)) => {
                self.ensure_no_live_handle()?;
                HandleKind::Indexed {
                    local: journal.create_tailer(),
                    writer: IndexedSinkWriter::new(journal.clone(), self.connector()),
                }
            }
            Some(JournalKind::Cycle(journal)) => {
                self.ensure_no_live_handle()?;
                HandleKind::Cycle {
                    local: journal.create_tailer(),
                    writer: CycleSinkWriter::new(journal.clone(), self.connector()),
                }
            }
        };

        let id = self.shared.next_handle.fetch_add(1, Ordering::SeqCst);
        self.shared.handles.lock().unwrap().push(id);
        Ok(SinkHandle {
            kind,
            id,
            shared: self.shared.clone(),
        })
    }

    fn ensure_no_live_handle(&self) -> Result<()> {
        if !self.shared.handles.lock().unwrap().is_empty() {
            return Err(Error::HandleActive);
        }
        Ok(())
    }

    fn connector(&self) -> SinkConnector {
        SinkConnector::new(self.addr, self.config.clone(), self.shared.closed.clone())
    }

    /// Entry count of the underlying journal; `0` without one.
    pub fn size(&self) -> i64 {
        match &self.journal {
            Some(JournalKind::Indexed(journal)) => journal.size(),
            Some(JournalKind::Cycle(journal)) => journal.size(),
            None => 0,
        }
    }

    /// Index of the newest local entry; `-1` without a journal.
    pub fn last_written_index(&self) -> i64 {
        match &self.journal {
            Some(JournalKind::Indexed(journal)) => journal.last_written_index(),
            Some(JournalKind::Cycle(journal)) => journal.last_index(),
            None => -1,
        }
    }

    /// Drop all local entries; no-op without a journal.
    pub fn clear(&self) {
        match &self.journal {
            Some(JournalKind::Indexed(journal)) => journal.clear(),
            Some(JournalKind::Cycle(journal)) => journal.clear(),
            None => {}
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_closed()
    }

    /// Number of registered consumer handles (diagnostic).
    pub fn live_handles(&self) -> usize {
        self.shared.handles.lock().unwrap().len()
    }

    /// Idempotent. Closes every registered handle — the close signal
    /// reaches each handle's connector, interrupting a blocked read and
    /// dropping its socket — then empties the registry and closes the
    /// journal; journal close errors are logged, not propagated.
    pub fn close(&self) {
        if !self.shared.closed.close() {
            return;
        }
        self.shared.handles.lock().unwrap().clear();

        let closed = match &self.journal {
            Some(JournalKind::Indexed(journal)) => journal.close(),
            Some(JournalKind::Cycle(journal)) => journal.close(),
            None => Ok(()),
        };
        if let Err(e) = closed {
            warn!(addr = %self.addr, error = %e, "error closing journal");
        }
        debug!(addr = %self.addr, "sink closed");
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        self.close();
    }
}

enum HandleKind {
    Indexed {
        local: Box<dyn JournalTailer>,
        writer: IndexedSinkWriter,
    },
    Cycle {
        local: Box<dyn JournalTailer>,
        writer: CycleSinkWriter,
    },
    Memory(MemoryTailer),
}

/// A consumer handle over the replicated stream. Driven by exactly one
/// task; every advancing operation takes `&mut self`.
pub struct SinkHandle {
    kind: HandleKind,
    id: u64,
    shared: Arc<Shared>,
}

impl SinkHandle {
    /// Move to the next record, pulling from the source as needed.
    /// `false` means nothing new is available right now — heartbeat, idle
    /// stream, closed sink, or a connection loss that the next call will
    /// recover from. Stream corruption surfaces as an error.
    pub async fn advance(&mut self) -> Result<bool> {
        match &mut self.kind {
            HandleKind::Indexed { local, writer } => {
                if local.advance() {
                    return Ok(true);
                }
                Ok(writer.replicate_next().await? && local.advance())
            }
            HandleKind::Cycle { local, writer } => {
                if local.advance() {
                    return Ok(true);
                }
                Ok(writer.replicate_next().await? && local.advance())
            }
            HandleKind::Memory(tailer) => tailer.advance().await,
        }
    }

    /// Position on the record at `index`. Persistent handles look locally
    /// first and pull one round from the source on a miss; memory handles
    /// renegotiate the position with the source.
    pub async fn seek(&mut self, index: i64) -> Result<bool> {
        match &mut self.kind {
            HandleKind::Indexed { local, writer } => {
                if local.seek(index) {
                    return Ok(true);
                }
                Ok(index >= 0 && writer.replicate_next().await? && local.seek(index))
            }
            HandleKind::Cycle { local, writer } => {
                if local.seek(index) {
                    return Ok(true);
                }
                Ok(index >= 0 && writer.replicate_next().await? && local.seek(index))
            }
            HandleKind::Memory(tailer) => tailer.seek(index).await,
        }
    }

    /// Rewind to the start of the stream.
    pub async fn to_start(&mut self) -> Result<bool> {
        match &mut self.kind {
            HandleKind::Indexed { local, .. } | HandleKind::Cycle { local, .. } => {
                local.to_start();
                Ok(true)
            }
            HandleKind::Memory(tailer) => tailer.seek(journalwire_core::frame::FROM_START).await,
        }
    }

    /// Jump to the current frontier.
    pub async fn to_end(&mut self) -> Result<bool> {
        match &mut self.kind {
            HandleKind::Indexed { local, .. } | HandleKind::Cycle { local, .. } => {
                local.to_end();
                Ok(true)
            }
            HandleKind::Memory(tailer) => tailer.seek(journalwire_core::frame::FROM_END).await,
        }
    }

    /// Index of the current record, `-1` before the first advance.
    pub fn index(&self) -> i64 {
        match &self.kind {
            HandleKind::Indexed { local, .. } | HandleKind::Cycle { local, .. } => local.index(),
            HandleKind::Memory(tailer) => tailer.index(),
        }
    }

    /// Payload of the current record.
    pub fn payload(&self) -> &[u8] {
        match &self.kind {
            HandleKind::Indexed { local, .. } | HandleKind::Cycle { local, .. } => local.payload(),
            HandleKind::Memory(tailer) => tailer.payload(),
        }
    }

    /// Release the current record. On a memory handle this steps the
    /// receive-buffer cursor past it; on persistent handles the local
    /// journal owns the storage and there is nothing to release.
    pub fn finish(&mut self) {
        if let HandleKind::Memory(tailer) = &mut self.kind {
            tailer.finish();
        }
    }

    /// Close the connection and deregister from the owning sink.
    /// Idempotent; also runs on drop.
    pub fn close(&mut self) {
        match &mut self.kind {
            HandleKind::Indexed { writer, .. } => writer.close(),
            HandleKind::Cycle { writer, .. } => writer.close(),
            HandleKind::Memory(tailer) => tailer.close(),
        }
        self.shared
            .handles
            .lock()
            .unwrap()
            .retain(|&id| id != self.id);
    }
}

impl Drop for SinkHandle {
    fn drop(&mut self) {
        self.close();
    }
}
