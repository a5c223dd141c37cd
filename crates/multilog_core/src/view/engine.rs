//! The view engine: incremental indexing of the merged entry stream.
//!
//! One engine owns one [`Registry`] and any number of named views.
//! Entries from every feed (local appends and replicated mirror
//! appends alike) are funneled through a single indexing queue and
//! folded by one background thread, so view mutation is serialized.
//! Per-view, per-writer cursors make the fold idempotent: an entry is
//! indexed exactly once no matter how often it is enqueued.
//!
//! Processes may run several independent engines (useful in tests);
//! there is no global state.

use crate::delivery::{self, DeliverySender};
use crate::error::{CoreError, CoreResult};
use crate::feed::Feed;
use crate::registry::Registry;
use crate::tail::{Tail, Window, TAIL_BUFFER};
use crate::types::{Entry, WriterId};
use crate::view::kv::{Head, KvUpdate, KvView, KvWatch};
use crate::view::list::ListView;
use crate::view::map::{ViewMap, ViewOps};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

/// Delivery buffer depth for key-value update watchers.
const KV_WATCH_BUFFER: usize = 64;

struct ListTail {
    n: usize,
    tx: DeliverySender<Window>,
}

struct ViewState {
    map: Box<dyn ViewMap>,
    list: ListView,
    kv: KvView,
    /// Next unindexed sequence per writer.
    cursors: HashMap<WriterId, u64>,
    kv_watchers: Vec<DeliverySender<KvUpdate>>,
    tails: Vec<ListTail>,
}

impl ViewState {
    fn new(map: Box<dyn ViewMap>) -> Self {
        Self {
            map,
            list: ListView::default(),
            kv: KvView::default(),
            cursors: HashMap::new(),
            kv_watchers: Vec::new(),
            tails: Vec::new(),
        }
    }

    /// Folds every entry of `feed` this view has not indexed yet.
    fn catch_up(&mut self, feed: &Feed) -> CoreResult<()> {
        let writer = feed.writer_id();
        let mut cursor = self.cursors.get(&writer).copied().unwrap_or(0);
        let len = feed.len()?;
        while cursor < len {
            let entry = feed.get(cursor)?;
            self.fold(&entry);
            cursor += 1;
            self.cursors.insert(writer, cursor);
        }
        Ok(())
    }

    fn fold(&mut self, entry: &Entry) {
        match self.map.map(entry) {
            ViewOps::Skip => {}
            ViewOps::List { sort_key } => {
                self.list.insert(sort_key, entry);
                let list = &self.list;
                self.tails.retain(|tail| tail.tx.send(list.last_n(tail.n)));
            }
            ViewOps::Kv(ops) => {
                for op in ops {
                    if let Some(update) = self.kv.apply(&op, &entry.payload) {
                        self.kv_watchers
                            .retain(|watcher| watcher.send(update.clone()));
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        self.list.clear();
        self.kv.clear();
        self.cursors.clear();
    }
}

type Views = Arc<RwLock<HashMap<String, ViewState>>>;

/// Indexes the merged entry stream of one [`Registry`] into named
/// views and answers queries against them.
pub struct Engine {
    registry: Registry,
    views: Views,
}

impl Engine {
    /// Creates an engine over the given registry.
    ///
    /// The engine subscribes to every current and future feed; views
    /// registered later replay history before going live.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        let views: Views = Arc::new(RwLock::new(HashMap::new()));
        let (entry_tx, entry_rx) = mpsc::channel::<Entry>();

        // Indexer: the only live-path writer of view state.
        {
            let views = Arc::clone(&views);
            let registry = registry.clone();
            thread::spawn(move || {
                while let Ok(entry) = entry_rx.recv() {
                    let Some(feed) = registry.get(entry.writer) else {
                        continue;
                    };
                    let mut views = views.write();
                    for (name, state) in views.iter_mut() {
                        if let Err(error) = state.catch_up(&feed) {
                            tracing::warn!(view = %name, error = %error, "view fold failed");
                        }
                    }
                }
            });
        }

        // Feed watcher: hooks every discovered feed into the indexing
        // queue (forward first, then catch up, so nothing is missed).
        {
            let views = Arc::clone(&views);
            let feeds_rx = registry.watch_feeds();
            thread::spawn(move || {
                while let Ok(feed) = feeds_rx.recv() {
                    feed.forward(entry_tx.clone());
                    let mut views = views.write();
                    for (name, state) in views.iter_mut() {
                        if let Err(error) = state.catch_up(&feed) {
                            tracing::warn!(view = %name, error = %error, "view catch-up failed");
                        }
                    }
                }
            });
        }

        Self { registry, views }
    }

    /// Creates an engine over a fresh in-memory registry.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Registry::in_memory())
    }

    /// Returns the registry this engine indexes.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Shorthand for [`Registry::local`].
    pub fn local(&self, name: &str) -> CoreResult<Feed> {
        self.registry.local(name)
    }

    /// Installs a view under `name` and replays all known feeds
    /// through it before returning, so the view is immediately
    /// queryable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ViewExists`] for a duplicate name, or a
    /// storage error if the replay fails.
    pub fn register_view(&self, name: impl Into<String>, map: impl ViewMap + 'static) -> CoreResult<()> {
        let name = name.into();
        let mut views = self.views.write();
        if views.contains_key(&name) {
            return Err(CoreError::view_exists(name));
        }

        let mut state = ViewState::new(Box::new(map));
        for feed in self.registry.feeds() {
            state.catch_up(&feed)?;
        }
        tracing::debug!(view = %name, "registered view");
        views.insert(name, state);
        Ok(())
    }

    /// Folds any not-yet-indexed entries on the calling thread.
    ///
    /// Live indexing runs on a background thread; this is a barrier
    /// for callers that need the views caught up with every append
    /// they have already observed. Idempotent.
    pub fn sync_views(&self) -> CoreResult<()> {
        let mut views = self.views.write();
        for feed in self.registry.feeds() {
            for state in views.values_mut() {
                state.catch_up(&feed)?;
            }
        }
        Ok(())
    }

    /// Discards a view's state and re-folds every feed from sequence
    /// 0 in registry order. The result must equal the incrementally
    /// built state; this is the determinism contract of view maps.
    ///
    /// Watchers and tails attached to the view survive a rebuild (and
    /// will observe the refold as updates).
    pub fn rebuild(&self, name: &str) -> CoreResult<()> {
        let mut views = self.views.write();
        let state = views
            .get_mut(name)
            .ok_or_else(|| CoreError::unknown_view(name))?;
        state.reset();
        for feed in self.registry.feeds() {
            state.catch_up(&feed)?;
        }
        Ok(())
    }

    /// Returns all list-view values in sort-key order.
    pub fn list(&self, name: &str) -> CoreResult<Vec<Vec<u8>>> {
        let views = self.views.read();
        let state = views
            .get(name)
            .ok_or_else(|| CoreError::unknown_view(name))?;
        Ok(state.list.values())
    }

    /// Returns list-view values whose sort key falls within the
    /// inclusive bounds; `None` leaves a side unbounded.
    pub fn list_range(
        &self,
        name: &str,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
    ) -> CoreResult<Vec<Vec<u8>>> {
        let views = self.views.read();
        let state = views
            .get(name)
            .ok_or_else(|| CoreError::unknown_view(name))?;
        Ok(state.list.range(from, to))
    }

    /// Returns the current heads for `key` in a key-value view.
    ///
    /// Empty if the key is unknown, one element if resolved, several
    /// on concurrent writes (resolution policy is the caller's).
    pub fn kv_get(&self, name: &str, key: &str) -> CoreResult<Vec<Head>> {
        let views = self.views.read();
        let state = views
            .get(name)
            .ok_or_else(|| CoreError::unknown_view(name))?;
        Ok(state.kv.get(key))
    }

    /// Subscribes to head-set changes of a key-value view.
    pub fn kv_watch(&self, name: &str) -> CoreResult<KvWatch> {
        let mut views = self.views.write();
        let state = views
            .get_mut(name)
            .ok_or_else(|| CoreError::unknown_view(name))?;
        let (tx, rx) = delivery::bounded(KV_WATCH_BUFFER);
        state.kv_watchers.push(tx);
        Ok(KvWatch::new(rx))
    }

    /// Tails a list view: delivers the current last-`n` window, then a
    /// fresh window per qualifying entry. `n = 0` yields one empty
    /// window and never updates.
    pub fn tail_list(&self, name: &str, n: usize) -> CoreResult<Tail> {
        let mut views = self.views.write();
        let state = views
            .get_mut(name)
            .ok_or_else(|| CoreError::unknown_view(name))?;
        let (tx, rx) = delivery::bounded(TAIL_BUFFER);
        tx.send(state.list.last_n(n));
        if n > 0 {
            state.tails.push(ListTail { n, tx });
        }
        Ok(Tail::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::map::KvOp;
    use proptest::prelude::*;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn payload_list_view() -> impl ViewMap + 'static {
        |entry: &Entry| ViewOps::List {
            sort_key: entry.payload.clone(),
        }
    }

    /// Key-value view over `key:payload` entries, linking every entry
    /// to the versions named after a `<` separator. Test shorthand for
    /// payloads like `k:v<<hexwriter>@0`.
    fn kv_view_over_self() -> impl ViewMap + 'static {
        |entry: &Entry| {
            let text = String::from_utf8_lossy(&entry.payload).to_string();
            let Some((key, rest)) = text.split_once(':') else {
                return ViewOps::Skip;
            };
            let mut parts = rest.split('<');
            let _value = parts.next();
            let links = parts.filter_map(|v| v.parse().ok()).collect();
            ViewOps::Kv(vec![KvOp::new(key, entry.version(), links)])
        }
    }

    #[test]
    fn register_then_append_indexes_live() {
        let engine = Engine::in_memory();
        engine.register_view("list", payload_list_view()).unwrap();

        let feed = engine.local("me").unwrap();
        feed.append(b"b").unwrap();
        feed.append(b"a").unwrap();

        engine.sync_views().unwrap();
        assert_eq!(
            engine.list("list").unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn register_after_append_replays_history() {
        let engine = Engine::in_memory();
        let feed = engine.local("me").unwrap();
        feed.append(b"2").unwrap();
        feed.append(b"1").unwrap();

        engine.register_view("list", payload_list_view()).unwrap();
        assert_eq!(
            engine.list("list").unwrap(),
            vec![b"1".to_vec(), b"2".to_vec()]
        );
    }

    #[test]
    fn merges_entries_across_feeds() {
        let engine = Engine::in_memory();
        let a = engine.local("a").unwrap();
        let b = engine.local("b").unwrap();
        a.append(b"3").unwrap();
        b.append(b"1").unwrap();
        a.append(b"2").unwrap();

        engine.register_view("list", payload_list_view()).unwrap();
        assert_eq!(
            engine.list("list").unwrap(),
            vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]
        );
    }

    #[test]
    fn list_range_bounds() {
        let engine = Engine::in_memory();
        let feed = engine.local("me").unwrap();
        for payload in [b"a", b"b", b"c"] {
            feed.append(payload).unwrap();
        }
        engine.register_view("list", payload_list_view()).unwrap();

        assert_eq!(
            engine.list_range("list", Some(b"b"), None).unwrap(),
            vec![b"b".to_vec(), b"c".to_vec()]
        );
    }

    #[test]
    fn unknown_view_errors() {
        let engine = Engine::in_memory();
        assert!(matches!(
            engine.list("nope"),
            Err(CoreError::UnknownView { .. })
        ));
        assert!(matches!(
            engine.kv_get("nope", "k"),
            Err(CoreError::UnknownView { .. })
        ));
    }

    #[test]
    fn duplicate_view_name_errors() {
        let engine = Engine::in_memory();
        engine.register_view("v", payload_list_view()).unwrap();
        assert!(matches!(
            engine.register_view("v", payload_list_view()),
            Err(CoreError::ViewExists { .. })
        ));
    }

    #[test]
    fn kv_causal_resolution() {
        let engine = Engine::in_memory();
        engine.register_view("kv", kv_view_over_self()).unwrap();

        let feed = engine.local("me").unwrap();
        let a = feed.append(b"k:first").unwrap();
        feed.append(format!("k:second<{a}").as_bytes()).unwrap();
        engine.sync_views().unwrap();

        // B supersedes A: one resolved head.
        let heads = engine.kv_get("kv", "k").unwrap();
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].version.sequence, 1);

        // A concurrent write from another feed conflicts.
        let other = engine.local("other").unwrap();
        other.append(b"k:concurrent").unwrap();
        engine.sync_views().unwrap();

        assert_eq!(engine.kv_get("kv", "k").unwrap().len(), 2);
    }

    #[test]
    fn kv_watch_fires_on_head_changes() {
        let engine = Engine::in_memory();
        engine.register_view("kv", kv_view_over_self()).unwrap();
        let watch = engine.kv_watch("kv").unwrap();

        let feed = engine.local("me").unwrap();
        feed.append(b"k:v").unwrap();
        engine.sync_views().unwrap();

        let update = watch.recv_timeout(WAIT).unwrap();
        assert_eq!(update.key, "k");
        assert_eq!(update.heads.len(), 1);
    }

    #[test]
    fn rebuild_reproduces_state() {
        let engine = Engine::in_memory();
        let a = engine.local("a").unwrap();
        let b = engine.local("b").unwrap();
        for payload in [b"z", b"m"] {
            a.append(payload).unwrap();
        }
        b.append(b"a").unwrap();

        engine.register_view("list", payload_list_view()).unwrap();
        let before = engine.list("list").unwrap();

        engine.rebuild("list").unwrap();
        assert_eq!(engine.list("list").unwrap(), before);
    }

    #[test]
    fn tail_list_tracks_sorted_window() {
        let engine = Engine::in_memory();
        engine.register_view("list", payload_list_view()).unwrap();
        let feed = engine.local("me").unwrap();
        feed.append(b"b").unwrap();
        engine.sync_views().unwrap();

        let tail = engine.tail_list("list", 2).unwrap();
        assert_eq!(tail.recv_timeout(WAIT).unwrap(), vec![b"b".to_vec()]);

        feed.append(b"a").unwrap();
        engine.sync_views().unwrap();
        assert_eq!(
            tail.recv_timeout(WAIT).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn tail_list_zero_is_empty_and_final() {
        let engine = Engine::in_memory();
        engine.register_view("list", payload_list_view()).unwrap();

        let tail = engine.tail_list("list", 0).unwrap();
        assert_eq!(tail.recv_timeout(WAIT).unwrap(), Window::new());
        assert_eq!(tail.recv(), None);
    }

    proptest! {
        /// Folding the same entries in any cross-feed delivery order
        /// yields identical list contents.
        #[test]
        fn list_view_is_order_independent(
            a_payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..8), 1..8),
            b_payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..8), 1..8),
            a_first in any::<bool>(),
        ) {
            let build = |a_first: bool| -> Vec<Vec<u8>> {
                let engine = Engine::in_memory();
                let a = engine.local("a").unwrap();
                let b = engine.local("b").unwrap();
                let (first, first_payloads, second, second_payloads) = if a_first {
                    (&a, &a_payloads, &b, &b_payloads)
                } else {
                    (&b, &b_payloads, &a, &a_payloads)
                };
                for payload in first_payloads {
                    first.append(payload).unwrap();
                }
                for payload in second_payloads {
                    second.append(payload).unwrap();
                }
                engine.register_view("list", |entry: &Entry| ViewOps::List {
                    sort_key: entry.payload.clone(),
                }).unwrap();
                engine.list("list").unwrap()
            };

            // Writer identities differ between engines, but payload
            // multisets must match regardless of delivery order.
            let mut one = build(a_first);
            let mut two = build(!a_first);
            one.sort();
            two.sort();
            prop_assert_eq!(one, two);
        }
    }
}
