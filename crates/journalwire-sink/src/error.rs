//! Sink error types
//!
//! ## Error categories
//!
//! - **Transient I/O** (`Io`): a socket read or write failed, or the
//!   source hung up mid-stream. The replication loops consume these
//!   internally — the connector is closed and the next consumer call
//!   reconnects and resumes — so they never escape a handle.
//! - **Stream corruption** (`Frame`, `IndexMismatch`): the source sent a
//!   frame that cannot be honoured. Fatal; the handle must be closed.
//! - **Misuse** (`HandleActive`, `AppendUnsupported`): synchronous
//!   failures with no state change.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] journalwire_core::Error),

    /// A data frame arrived out of order for an indexed journal: either a
    /// gap or a duplicate. Indicates a source bug or a hostile peer.
    #[error("stream corrupted: expected index {expected}, got {found}")]
    IndexMismatch { expected: i64, found: i64 },

    #[error("a consumer handle is already active on this sink")]
    HandleActive,

    #[error("appending to a sink is not supported")]
    AppendUnsupported,
}

impl Error {
    /// Whether reconnecting can recover from this error. Everything else
    /// ends the consumer.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}
