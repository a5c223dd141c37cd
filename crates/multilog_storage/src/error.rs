//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read a sequence number past the end of the store.
    #[error("sequence {sequence} out of range: store holds {len} entries")]
    OutOfRange {
        /// The requested sequence number.
        sequence: u64,
        /// The current number of stored entries.
        len: u64,
    },

    /// Attempted to put an entry at a sequence other than the next one.
    ///
    /// Feeds are gapless: the only valid `put` target is the current length.
    #[error("sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// The next sequence the store will accept.
        expected: u64,
        /// The sequence that was supplied.
        actual: u64,
    },

    /// The store's on-disk representation is corrupted.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
