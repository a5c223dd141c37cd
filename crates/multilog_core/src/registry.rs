//! Feed registry: the set of feeds known to one process.
//!
//! A registry owns the process's writable feeds (one per local name)
//! plus a read-only mirror for every remote writer discovered through
//! replication. Iteration order over feeds is stable (insertion
//! order), which is what makes full view rebuilds deterministic.

use crate::error::{CoreError, CoreResult};
use crate::feed::Feed;
use crate::types::WriterId;
use multilog_storage::{EntryStore, MemoryStore, StorageResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Creates the entry store backing a newly created or discovered feed.
type StoreFactory = dyn Fn(WriterId) -> StorageResult<Box<dyn EntryStore>> + Send + Sync;

struct RegistryState {
    /// Feeds in stable discovery order (local creations first).
    feeds: Vec<Feed>,
    by_writer: HashMap<WriterId, usize>,
    /// Local feed names, so `local` is idempotent per name.
    names: HashMap<String, WriterId>,
    watchers: Vec<Sender<Feed>>,
}

struct RegistryInner {
    factory: Box<StoreFactory>,
    state: RwLock<RegistryState>,
}

/// Tracks every feed known to this process.
///
/// Cheap to clone; clones share the same feed set. Replication
/// sessions and the view engine each hold a clone.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Creates a registry whose feeds are backed by stores from the
    /// given factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(WriterId) -> StorageResult<Box<dyn EntryStore>> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(RegistryInner {
                factory: Box::new(factory),
                state: RwLock::new(RegistryState {
                    feeds: Vec::new(),
                    by_writer: HashMap::new(),
                    names: HashMap::new(),
                    watchers: Vec::new(),
                }),
            }),
        }
    }

    /// Creates a registry backed entirely by in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(|_| Ok(Box::new(MemoryStore::new())))
    }

    /// Returns (creating if absent) the writable local feed under
    /// `name`. Idempotent per name for the process lifetime.
    pub fn local(&self, name: &str) -> CoreResult<Feed> {
        let mut state = self.inner.state.write();
        if let Some(writer) = state.names.get(name) {
            let index = state.by_writer[writer];
            return Ok(state.feeds[index].clone());
        }

        let writer = WriterId::random();
        let store = (self.inner.factory)(writer)?;
        let feed = Feed::new_local(writer, store);
        state.names.insert(name.to_string(), writer);
        Self::insert(&mut state, feed.clone());
        tracing::debug!(%writer, name, "created local feed");
        Ok(feed)
    }

    /// Returns (creating if absent) the feed for `writer`.
    ///
    /// If the writer is unknown, a read-only mirror is created and
    /// every feed watcher is notified of the discovery.
    pub fn mirror(&self, writer: WriterId) -> CoreResult<Feed> {
        let mut state = self.inner.state.write();
        if let Some(&index) = state.by_writer.get(&writer) {
            return Ok(state.feeds[index].clone());
        }

        let store = (self.inner.factory)(writer)?;
        let feed = Feed::new_mirror(writer, store);
        Self::insert(&mut state, feed.clone());
        tracing::debug!(%writer, "discovered remote feed");
        Ok(feed)
    }

    /// Returns the feed for `writer`, if tracked.
    #[must_use]
    pub fn get(&self, writer: WriterId) -> Option<Feed> {
        let state = self.inner.state.read();
        state.by_writer.get(&writer).map(|&i| state.feeds[i].clone())
    }

    /// Returns all tracked feeds in stable discovery order.
    #[must_use]
    pub fn feeds(&self) -> Vec<Feed> {
        self.inner.state.read().feeds.clone()
    }

    /// Returns the number of tracked feeds.
    #[must_use]
    pub fn feed_count(&self) -> usize {
        self.inner.state.read().feeds.len()
    }

    /// Returns the length of the feed for `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownFeed`] if the writer is untracked.
    pub fn len_of(&self, writer: WriterId) -> CoreResult<u64> {
        self.get(writer)
            .ok_or(CoreError::UnknownFeed { writer })?
            .len()
    }

    /// Watches for feed discoveries.
    ///
    /// The receiver first yields every feed already tracked, then one
    /// message per later discovery, so a late watcher cannot miss a
    /// feed. Dropped receivers are cleaned up lazily.
    #[must_use]
    pub fn watch_feeds(&self) -> Receiver<Feed> {
        let mut state = self.inner.state.write();
        let (tx, rx) = mpsc::channel();
        for feed in &state.feeds {
            // A fresh channel cannot be disconnected yet.
            let _ = tx.send(feed.clone());
        }
        state.watchers.push(tx);
        rx
    }

    fn insert(state: &mut RegistryState, feed: Feed) {
        state.by_writer.insert(feed.writer_id(), state.feeds.len());
        state.feeds.push(feed.clone());
        state.watchers.retain(|tx| tx.send(feed.clone()).is_ok());
    }
}
