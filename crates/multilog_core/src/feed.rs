//! Append-only feeds.
//!
//! A [`Feed`] is one writer's gapless, immutable entry sequence. The
//! local process appends to feeds it owns with [`Feed::append`];
//! remote feeds are append-only mirrors that only the replication
//! layer advances, through [`Feed::apply`].
//!
//! Live readers subscribe before scanning stored entries, so no entry
//! is ever missed between catch-up and going live.

use crate::error::{CoreError, CoreResult};
use crate::types::{Entry, Version, WriterId};
use multilog_storage::{EntryStore, StorageError};
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

struct FeedInner {
    writer: WriterId,
    writable: bool,
    store: RwLock<Box<dyn EntryStore>>,
    subscribers: RwLock<Vec<Sender<Entry>>>,
}

/// A single writer's append-only, locally-numbered entry sequence.
///
/// Cheap to clone; clones share the same underlying store and
/// subscriber set.
///
/// # Invariants
///
/// - sequence numbers are gapless and strictly increasing from 0
/// - entries are immutable once stored
/// - only the owning process appends to a writable feed; only
///   replication sessions advance a mirror
#[derive(Clone)]
pub struct Feed {
    inner: Arc<FeedInner>,
}

impl Feed {
    pub(crate) fn new_local(writer: WriterId, store: Box<dyn EntryStore>) -> Self {
        Self::new(writer, store, true)
    }

    pub(crate) fn new_mirror(writer: WriterId, store: Box<dyn EntryStore>) -> Self {
        Self::new(writer, store, false)
    }

    fn new(writer: WriterId, store: Box<dyn EntryStore>, writable: bool) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                writer,
                writable,
                store: RwLock::new(store),
                subscribers: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Returns the writer identity that owns this feed.
    #[must_use]
    pub fn writer_id(&self) -> WriterId {
        self.inner.writer
    }

    /// Returns true if this process may append to the feed.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.inner.writable
    }

    /// Returns the number of entries currently stored.
    ///
    /// This is also the sequence number the next append will receive.
    pub fn len(&self) -> CoreResult<u64> {
        Ok(self.inner.store.read().len()?)
    }

    /// Returns true if the feed holds no entries.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Appends a payload to a locally owned feed.
    ///
    /// Assigns the next sequence number, stores the entry, then
    /// notifies live subscribers synchronously. Returns the new
    /// entry's [`Version`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotWritable`] on a mirror, or the storage
    /// error if the write fails (in which case nothing is appended).
    pub fn append(&self, payload: &[u8]) -> CoreResult<Version> {
        if !self.inner.writable {
            return Err(CoreError::NotWritable {
                writer: self.inner.writer,
            });
        }

        let mut store = self.inner.store.write();
        let sequence = store.len()?;
        store.put(sequence, payload)?;

        let entry = Entry::new(self.inner.writer, sequence, payload.to_vec());
        self.notify(&entry);
        Ok(entry.version())
    }

    /// Applies a replicated entry to a mirror.
    ///
    /// Returns `Ok(true)` if the entry was stored, `Ok(false)` if it
    /// was a duplicate (sequence below the current length). Duplicate
    /// suppression makes delivery idempotent, so overlapping
    /// replication sessions for the same feed are safe.
    ///
    /// # Errors
    ///
    /// - [`CoreError::LocalFeed`] if this feed is locally writable
    /// - [`CoreError::WriterMismatch`] if the entry belongs elsewhere
    /// - [`CoreError::NonContiguousAppend`] if the entry skips ahead;
    ///   callers buffer such entries until the gap is filled
    pub fn apply(&self, entry: Entry) -> CoreResult<bool> {
        if self.inner.writable {
            return Err(CoreError::LocalFeed {
                writer: self.inner.writer,
            });
        }
        if entry.writer != self.inner.writer {
            return Err(CoreError::WriterMismatch {
                entry: entry.writer,
                feed: self.inner.writer,
            });
        }

        let mut store = self.inner.store.write();
        let len = store.len()?;
        if entry.sequence < len {
            return Ok(false);
        }
        if entry.sequence > len {
            return Err(CoreError::NonContiguousAppend {
                writer: self.inner.writer,
                expected: len,
                actual: entry.sequence,
            });
        }

        store.put(entry.sequence, &entry.payload)?;
        self.notify(&entry);
        Ok(true)
    }

    /// Reads the entry stored at `sequence`.
    pub fn get(&self, sequence: u64) -> CoreResult<Entry> {
        let payload = self.inner.store.read().get(sequence)?;
        Ok(Entry::new(self.inner.writer, sequence, payload))
    }

    /// Subscribes to entries appended after this call.
    ///
    /// Returns a receiver yielding every future entry in sequence
    /// order. Disconnected receivers are cleaned up lazily on the next
    /// append.
    pub fn subscribe(&self) -> Receiver<Entry> {
        let (tx, rx) = mpsc::channel();
        self.inner.subscribers.write().push(tx);
        rx
    }

    /// Registers an externally owned sender as a subscriber.
    ///
    /// Used by the view engine to funnel entries from many feeds into
    /// one indexing queue.
    pub fn forward(&self, tx: Sender<Entry>) {
        self.inner.subscribers.write().push(tx);
    }

    /// Produces entries starting at `from_sequence` in sequence order.
    ///
    /// With `live = false` the iterator ends at the current length.
    /// With `live = true` it is infinite: after catching up on stored
    /// entries it blocks for future appends. The returned iterator is
    /// not restartable; call `read` again from a chosen offset instead.
    #[must_use]
    pub fn read(&self, from_sequence: u64, live: bool) -> FeedReader {
        // Subscribe before the catch-up scan so nothing is missed.
        let rx = live.then(|| self.subscribe());
        FeedReader {
            feed: self.clone(),
            next: from_sequence,
            rx,
        }
    }

    fn notify(&self, entry: &Entry) {
        let mut subscribers = self.inner.subscribers.write();
        subscribers.retain(|tx| tx.send(entry.clone()).is_ok());
    }
}

/// Iterator over a feed's entries, optionally live.
///
/// Created by [`Feed::read`].
pub struct FeedReader {
    feed: Feed,
    next: u64,
    rx: Option<Receiver<Entry>>,
}

impl FeedReader {
    /// The sequence number the next call to `next` will yield.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.next
    }
}

impl Iterator for FeedReader {
    type Item = CoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.feed.get(self.next) {
                Ok(entry) => {
                    self.next += 1;
                    return Some(Ok(entry));
                }
                Err(CoreError::Storage(StorageError::OutOfRange { .. })) => {
                    let rx = self.rx.as_ref()?;
                    match rx.recv() {
                        // The subscription may replay entries the scan
                        // already covered; skip those.
                        Ok(entry) if entry.sequence < self.next => continue,
                        Ok(entry) if entry.sequence == self.next => {
                            self.next += 1;
                            return Some(Ok(entry));
                        }
                        // Ahead of the cursor: loop and read the gap
                        // from the store.
                        Ok(_) => continue,
                        Err(_) => return None,
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
