//! File-based entry store for persistent feeds.

use crate::error::{StorageError, StorageResult};
use crate::store::EntryStore;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// On-disk record framing: a 4-byte big-endian payload length, then the payload.
const LEN_PREFIX: u64 = 4;

/// A file-based entry store.
///
/// Entries are written as length-prefixed records in sequence order.
/// On open the file is scanned once to rebuild the sequence -> offset
/// index, so reads are a single positioned I/O.
///
/// # Durability
///
/// - `flush()` calls `File::sync_data()` so stored entries survive
///   process termination
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```no_run
/// use multilog_storage::{EntryStore, FileStore};
/// use std::path::Path;
///
/// let mut store = FileStore::open(Path::new("feed.log")).unwrap();
/// let next = store.len().unwrap();
/// store.put(next, b"persistent entry").unwrap();
/// store.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: RwLock<File>,
    /// Byte offset of each record's length prefix, in sequence order.
    offsets: RwLock<Vec<u64>>,
    /// Total bytes of valid records (where the next record starts).
    tail: RwLock<u64>,
}

impl FileStore {
    /// Opens or creates a file store at the given path.
    ///
    /// If the file exists, its records are scanned to rebuild the
    /// sequence index.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or
    /// [`StorageError::Corrupted`] if it contains a torn or invalid
    /// record.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();
        let mut offsets = Vec::new();
        let mut pos = 0u64;

        file.seek(SeekFrom::Start(0))?;
        while pos < size {
            if pos + LEN_PREFIX > size {
                return Err(StorageError::corrupted(format!(
                    "torn length prefix at offset {pos}"
                )));
            }
            let mut len_buf = [0u8; 4];
            file.read_exact(&mut len_buf)?;
            let len = u64::from(u32::from_be_bytes(len_buf));
            if pos + LEN_PREFIX + len > size {
                return Err(StorageError::corrupted(format!(
                    "torn record at offset {pos}: length {len} exceeds file size {size}"
                )));
            }
            offsets.push(pos);
            pos += LEN_PREFIX + len;
            file.seek(SeekFrom::Start(pos))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            offsets: RwLock::new(offsets),
            tail: RwLock::new(pos),
        })
    }

    /// Opens or creates a file store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file
    /// cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntryStore for FileStore {
    fn put(&mut self, sequence: u64, payload: &[u8]) -> StorageResult<()> {
        let mut file = self.file.write();
        let mut offsets = self.offsets.write();
        let mut tail = self.tail.write();

        let expected = offsets.len() as u64;
        if sequence != expected {
            return Err(StorageError::SequenceMismatch {
                expected,
                actual: sequence,
            });
        }

        let len = u32::try_from(payload.len()).map_err(|_| {
            StorageError::corrupted(format!("payload of {} bytes exceeds record limit", payload.len()))
        })?;

        let offset = *tail;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&len.to_be_bytes())?;
        file.write_all(payload)?;

        offsets.push(offset);
        *tail = offset + LEN_PREFIX + u64::from(len);
        Ok(())
    }

    fn get(&self, sequence: u64) -> StorageResult<Vec<u8>> {
        let offsets = self.offsets.read();
        let offset = *offsets
            .get(sequence as usize)
            .ok_or(StorageError::OutOfRange {
                sequence,
                len: offsets.len() as u64,
            })?;
        drop(offsets);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;
        Ok(payload)
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.offsets.read().len() as u64)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.write().sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_put_and_get() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.log");

        let mut store = FileStore::open(&path).unwrap();
        store.put(0, b"hello").unwrap();
        store.put(1, b"world").unwrap();

        assert_eq!(store.get(0).unwrap(), b"hello");
        assert_eq!(store.get(1).unwrap(), b"world");
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn file_reopen_rebuilds_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.log");

        {
            let mut store = FileStore::open(&path).unwrap();
            store.put(0, b"one").unwrap();
            store.put(1, b"two").unwrap();
            store.put(2, b"").unwrap();
            store.flush().unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.get(0).unwrap(), b"one");
        assert_eq!(store.get(1).unwrap(), b"two");
        assert_eq!(store.get(2).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn file_put_wrong_sequence_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.log");

        let mut store = FileStore::open(&path).unwrap();
        store.put(0, b"a").unwrap();

        assert!(matches!(
            store.put(5, b"gap"),
            Err(StorageError::SequenceMismatch {
                expected: 1,
                actual: 5
            })
        ));
    }

    #[test]
    fn file_torn_record_is_corrupted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.log");

        {
            let mut store = FileStore::open(&path).unwrap();
            store.put(0, b"complete").unwrap();
            store.flush().unwrap();
        }

        // Claim a longer record than the file holds
        {
            use std::fs::OpenOptions;
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&100u32.to_be_bytes()).unwrap();
            file.write_all(b"short").unwrap();
        }

        assert!(matches!(
            FileStore::open(&path),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn file_open_with_create_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dirs").join("feed.log");

        let mut store = FileStore::open_with_create_dirs(&path).unwrap();
        store.put(0, b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_get_out_of_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.log");

        let store = FileStore::open(&path).unwrap();
        assert!(matches!(
            store.get(0),
            Err(StorageError::OutOfRange { .. })
        ));
    }
}
