//! Error types for Multilog core.

use crate::types::WriterId;
use multilog_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Multilog core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Attempted to append to a feed this process does not own.
    #[error("feed {writer} is a remote mirror and not locally writable")]
    NotWritable {
        /// The mirrored feed's writer identity.
        writer: WriterId,
    },

    /// Attempted a replication append to a locally owned feed.
    #[error("feed {writer} is locally owned; replication cannot append to it")]
    LocalFeed {
        /// The local feed's writer identity.
        writer: WriterId,
    },

    /// A mirror append skipped ahead of the feed's current length.
    ///
    /// Gap buffering is the replication session's job; by the time an
    /// entry reaches [`crate::Feed::apply`] it must be the exact next
    /// sequence (or an ignorable duplicate).
    #[error("non-contiguous append to feed {writer}: expected sequence {expected}, got {actual}")]
    NonContiguousAppend {
        /// The feed's writer identity.
        writer: WriterId,
        /// The next sequence the feed will accept.
        expected: u64,
        /// The sequence that was supplied.
        actual: u64,
    },

    /// An entry was delivered to a feed owned by a different writer.
    #[error("entry for writer {entry} delivered to feed {feed}")]
    WriterMismatch {
        /// The writer the entry belongs to.
        entry: WriterId,
        /// The writer of the feed it was delivered to.
        feed: WriterId,
    },

    /// Query against a view name that was never registered.
    #[error("unknown view: {name}")]
    UnknownView {
        /// The requested view name.
        name: String,
    },

    /// A view with this name is already registered.
    #[error("view already registered: {name}")]
    ViewExists {
        /// The conflicting view name.
        name: String,
    },

    /// Query against a feed that is not tracked by the registry.
    #[error("unknown feed: {writer}")]
    UnknownFeed {
        /// The requested writer identity.
        writer: WriterId,
    },
}

impl CoreError {
    /// Creates an unknown-view error.
    pub fn unknown_view(name: impl Into<String>) -> Self {
        Self::UnknownView { name: name.into() }
    }

    /// Creates a view-exists error.
    pub fn view_exists(name: impl Into<String>) -> Self {
        Self::ViewExists { name: name.into() }
    }
}
