//! Error types for replication.

use multilog_core::WriterId;
use thiserror::Error;

/// Result type for replication operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while replicating feeds.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport I/O failed.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A message failed to encode.
    #[error("message encode error: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    /// A message failed to decode.
    #[error("message decode error: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),

    /// An incoming frame exceeds the configured limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Declared frame length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Too many out-of-order entries buffered for one writer.
    #[error("gap buffer for writer {writer} is full ({buffered} entries)")]
    GapBufferOverflow {
        /// The writer whose entries are being buffered.
        writer: WriterId,
        /// Entries currently buffered.
        buffered: usize,
    },

    /// The peer violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A feed or registry operation failed.
    #[error("feed error: {0}")]
    Core(#[from] multilog_core::CoreError),

    /// The session was closed.
    #[error("session closed")]
    Closed,
}

impl SyncError {
    /// Creates a protocol violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        SyncError::Protocol(message.into())
    }
}
