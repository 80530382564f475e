//! journalwire sink
//!
//! The consuming end of a TCP replication session for an append-only
//! journal. A sink connects to one source, announces the last index it has
//! durably observed, and drains the stream of records the source publishes
//! after that point. It survives process restarts (it resynchronises from
//! local state, never losing nor duplicating a record) and transient
//! network failures (it reconnects with a configurable delay).
//!
//! ## Data flow
//!
//! ```text
//! ┌──────────┐   frames    ┌───────────────┐
//! │  Source  │ ──────────▶ │ SinkConnector │  socket + receive buffer
//! └──────────┘             └───────┬───────┘
//!                                  │ header + payload slices
//!                 ┌────────────────┼────────────────┐
//!                 ▼                ▼                ▼
//!        IndexedSinkWriter  CycleSinkWriter   MemoryTailer
//!        (indexed journal)  (cycle journal)   (no persistence)
//! ```
//!
//! The consumer drives everything: each call to [`SinkHandle::advance`]
//! pulls bytes until one record is available or the stream is idle.
//! Nothing runs in the background.
//!
//! ## Modes
//!
//! - **Indexed** ([`Sink::indexed`]): records are appended to an indexed
//!   journal; the frame index must equal the journal's size, and padding
//!   frames are replayed as block padding so indices stay aligned.
//! - **Cycle** ([`Sink::cycle`]): records land in the cycle derived from
//!   the high bits of the frame index; the source's post-reconnect replay
//!   of the last acknowledged record is skipped.
//! - **Memory** ([`Sink::memory`]): no journal at all; records are exposed
//!   zero-copy out of the receive buffer.
//!
//! Sinks are read-only: [`Sink::create_appender`] always fails.
//!
//! ## Usage
//!
//! ```ignore
//! use journalwire_core::MemIndexedJournal;
//! use journalwire_sink::{Sink, SinkConfig};
//! use std::sync::Arc;
//!
//! let journal = Arc::new(MemIndexedJournal::new(64 * 1024));
//! let sink = Sink::indexed(journal, "10.0.0.7:9911".parse()?, SinkConfig::default());
//!
//! let mut tailer = sink.create_tailer()?;
//! while tailer.advance().await? {
//!     process(tailer.index(), tailer.payload());
//!     tailer.finish();
//! }
//! ```

pub mod config;
pub mod error;
pub mod sink;

mod connector;
mod cycle;
mod indexed;
mod shutdown;
mod tailer;

pub use config::SinkConfig;
pub use error::{Error, Result};
pub use sink::{Sink, SinkHandle};
