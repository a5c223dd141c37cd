//! In-memory entry store for testing.

use crate::error::{StorageError, StorageResult};
use crate::store::EntryStore;
use parking_lot::RwLock;

/// An in-memory entry store.
///
/// This store keeps all entries in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral feeds that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use multilog_storage::{EntryStore, MemoryStore};
///
/// let mut store = MemoryStore::new();
/// store.put(0, b"first").unwrap();
/// store.put(1, b"second").unwrap();
/// assert_eq!(store.len().unwrap(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Vec<Vec<u8>>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with entries.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_entries(entries: Vec<Vec<u8>>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl EntryStore for MemoryStore {
    fn put(&mut self, sequence: u64, payload: &[u8]) -> StorageResult<()> {
        let mut entries = self.entries.write();
        let expected = entries.len() as u64;
        if sequence != expected {
            return Err(StorageError::SequenceMismatch {
                expected,
                actual: sequence,
            });
        }
        entries.push(payload.to_vec());
        Ok(())
    }

    fn get(&self, sequence: u64) -> StorageResult<Vec<u8>> {
        let entries = self.entries.read();
        entries
            .get(sequence as usize)
            .cloned()
            .ok_or(StorageError::OutOfRange {
                sequence,
                len: entries.len() as u64,
            })
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.entries.read().len() as u64)
    }

    fn flush(&mut self) -> StorageResult<()> {
        // Nothing pending for an in-memory store
        Ok(())
    }
}
