//! Core error types
//!
//! Wire-level failures shared by everything that decodes frames. The sink
//! crate wraps this into its own error enum; see `journalwire-sink`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A frame announced a payload length that is neither a control
    /// sentinel nor within `0..=MAX_PAYLOAD`. The stream is corrupted and
    /// the session cannot be resumed.
    #[error("frame size {0} is outside the legal range")]
    SizeOutOfRange(i32),
}
