//! Ordered list view state.

use crate::types::{Entry, WriterId};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Composite index key: sort key first, then `(writer, sequence)` as a
/// deterministic tiebreak. Field order carries the derived `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ListKey {
    sort_key: Vec<u8>,
    writer: WriterId,
    sequence: u64,
}

/// An ordered index of entry payloads, sorted by a derived key.
#[derive(Default)]
pub(crate) struct ListView {
    index: BTreeMap<ListKey, Vec<u8>>,
}

impl ListView {
    /// Inserts an entry under its derived sort key.
    ///
    /// Re-inserting the same entry overwrites the identical index slot,
    /// so folds stay idempotent.
    pub(crate) fn insert(&mut self, sort_key: Vec<u8>, entry: &Entry) {
        self.index.insert(
            ListKey {
                sort_key,
                writer: entry.writer,
                sequence: entry.sequence,
            },
            entry.payload.clone(),
        );
    }

    /// Returns all payloads in sort order.
    pub(crate) fn values(&self) -> Vec<Vec<u8>> {
        self.index.values().cloned().collect()
    }

    /// Returns payloads whose sort key falls within the inclusive
    /// bounds. `None` leaves that side unbounded.
    pub(crate) fn range(&self, from: Option<&[u8]>, to: Option<&[u8]>) -> Vec<Vec<u8>> {
        let lower = match from {
            Some(key) => Bound::Included(ListKey {
                sort_key: key.to_vec(),
                writer: WriterId::from_bytes([0x00; 16]),
                sequence: 0,
            }),
            None => Bound::Unbounded,
        };
        let upper = match to {
            Some(key) => Bound::Included(ListKey {
                sort_key: key.to_vec(),
                writer: WriterId::from_bytes([0xff; 16]),
                sequence: u64::MAX,
            }),
            None => Bound::Unbounded,
        };
        self.index.range((lower, upper)).map(|(_, v)| v.clone()).collect()
    }

    /// Returns the last `n` payloads in sort order.
    pub(crate) fn last_n(&self, n: usize) -> Vec<Vec<u8>> {
        let mut window: Vec<_> = self.index.values().rev().take(n).cloned().collect();
        window.reverse();
        window
    }

    /// Number of indexed entries.
    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// Discards all state, ready for a rebuild.
    pub(crate) fn clear(&mut self) {
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(writer: WriterId, sequence: u64, payload: &[u8]) -> Entry {
        Entry::new(writer, sequence, payload.to_vec())
    }

    #[test]
    fn values_sorted_by_key() {
        let writer = WriterId::random();
        let mut view = ListView::default();
        view.insert(b"2".to_vec(), &entry(writer, 0, b"second"));
        view.insert(b"1".to_vec(), &entry(writer, 1, b"first"));
        view.insert(b"3".to_vec(), &entry(writer, 2, b"third"));

        assert_eq!(
            view.values(),
            vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
        );
    }

    #[test]
    fn equal_keys_break_ties_by_writer_then_sequence() {
        let a = WriterId::from_bytes([1; 16]);
        let b = WriterId::from_bytes([2; 16]);
        let mut view = ListView::default();
        view.insert(b"k".to_vec(), &entry(b, 0, b"from_b"));
        view.insert(b"k".to_vec(), &entry(a, 1, b"from_a1"));
        view.insert(b"k".to_vec(), &entry(a, 0, b"from_a0"));

        assert_eq!(
            view.values(),
            vec![b"from_a0".to_vec(), b"from_a1".to_vec(), b"from_b".to_vec()]
        );
    }

    #[test]
    fn reinsert_is_idempotent() {
        let writer = WriterId::random();
        let mut view = ListView::default();
        let e = entry(writer, 0, b"once");
        view.insert(b"k".to_vec(), &e);
        view.insert(b"k".to_vec(), &e);

        assert_eq!(view.len(), 1);
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let writer = WriterId::random();
        let mut view = ListView::default();
        for (key, payload) in [("a", "pa"), ("b", "pb"), ("c", "pc"), ("d", "pd")] {
            let seq = view.len() as u64;
            view.insert(key.as_bytes().to_vec(), &entry(writer, seq, payload.as_bytes()));
        }

        let mid = view.range(Some(b"b"), Some(b"c"));
        assert_eq!(mid, vec![b"pb".to_vec(), b"pc".to_vec()]);

        let tail = view.range(Some(b"c"), None);
        assert_eq!(tail, vec![b"pc".to_vec(), b"pd".to_vec()]);

        let head = view.range(None, Some(b"a"));
        assert_eq!(head, vec![b"pa".to_vec()]);
    }

    #[test]
    fn last_n_window() {
        let writer = WriterId::random();
        let mut view = ListView::default();
        for (i, key) in [b"1", b"2", b"3"].iter().enumerate() {
            view.insert(key.to_vec(), &entry(writer, i as u64, key.as_slice()));
        }

        assert_eq!(view.last_n(2), vec![b"2".to_vec(), b"3".to_vec()]);
        assert_eq!(view.last_n(0), Vec::<Vec<u8>>::new());
        assert_eq!(view.last_n(10).len(), 3);
    }

    #[test]
    fn clear_resets_state() {
        let writer = WriterId::random();
        let mut view = ListView::default();
        view.insert(b"k".to_vec(), &entry(writer, 0, b"v"));
        view.clear();
        assert_eq!(view.len(), 0);
    }
}
