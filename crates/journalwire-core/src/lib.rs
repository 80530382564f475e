//! Core types for journalwire replication
//!
//! This crate holds the pieces shared by both ends of the replication wire:
//!
//! 1. **Frame codec** (`frame`): the fixed 12-byte header, the control
//!    sentinels carried in its `size` field, and the big-endian resume
//!    request a sink writes after every (re)connect.
//! 2. **Journal contracts** (`journal`): the appender/tailer traits a sink
//!    drives on its local journal. The storage engines themselves live
//!    behind these traits.
//! 3. **In-memory journals** (`mem`): reference implementations of the
//!    contracts, used throughout the test suites.
//!
//! ## Frame format
//!
//! ```text
//! ┌──────────────┬───────────────┬──────────────────────┐
//! │ size (i32)   │ index (i64)   │ payload (size bytes) │
//! │ native order │ native order  │ iff size > 0         │
//! └──────────────┴───────────────┴──────────────────────┘
//! ```
//!
//! Negative `size` values are control frames (heartbeat, block padding,
//! resume acknowledgement); anything else outside `0..=128 MiB` is stream
//! corruption.

pub mod error;
pub mod frame;
pub mod journal;
pub mod mem;

pub use error::{Error, Result};
pub use frame::{FrameHeader, FrameKind};
pub use journal::{
    CycleAppender, CycleJournal, IndexedAppender, IndexedJournal, JournalTailer,
};
pub use mem::{MemCycleJournal, MemIndexedJournal};
