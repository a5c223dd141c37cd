//! Entry store trait definition.

use crate::error::StorageResult;

/// A sequence-addressed store backing one feed.
///
/// Entry stores hold the immutable payloads of a single writer's feed,
/// addressed by sequence number. They are **opaque payload stores**:
/// Multilog owns all interpretation of the bytes.
///
/// # Invariants
///
/// - `put(sequence, ..)` only succeeds when `sequence == len()`
/// - `get` returns exactly the bytes previously stored at that sequence
/// - stored entries are never overwritten or removed
/// - stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - For testing
/// - [`crate::FileStore`] - For persistent feeds
pub trait EntryStore: Send + Sync {
    /// Stores the payload for the given sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::SequenceMismatch`] if `sequence`
    /// is not the current length, or an I/O error if the write fails.
    /// On error nothing is stored.
    fn put(&mut self, sequence: u64, payload: &[u8]) -> StorageResult<()>;

    /// Reads the payload stored at the given sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::OutOfRange`] if no entry exists
    /// at `sequence`, or an I/O error if the read fails.
    fn get(&self, sequence: u64) -> StorageResult<Vec<u8>>;

    /// Returns the number of stored entries.
    ///
    /// This is the sequence number the next `put` must use.
    fn len(&self) -> StorageResult<u64>;

    /// Returns true if the store holds no entries.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Flushes all pending writes to durable storage.
    ///
    /// After this returns successfully, all previously stored entries
    /// are guaranteed to survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;
}
