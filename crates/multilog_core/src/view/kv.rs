//! Causal key-value view state.
//!
//! Each application key maps to its set of **head** versions: versions
//! no other version under the same key has declared as a causal
//! predecessor. One head means the key is resolved; several heads mean
//! concurrent writes, and resolution policy is the caller's call.
//!
//! Links may arrive before the version they point at (replication is
//! not ordered across feeds). Instead of dropping such links, the view
//! remembers every superseded version per key, so a late-arriving
//! target never surfaces as a head. This closes the silent-drop gap
//! the link model otherwise has.

use crate::delivery::DeliveryReceiver;
use crate::types::Version;
use crate::view::map::KvOp;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

/// One current head for a key: the version and its entry payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    /// The head version.
    pub version: Version,
    /// Payload of the entry that introduced the version.
    pub payload: Vec<u8>,
}

/// Notification that a key's head set changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvUpdate {
    /// The affected key.
    pub key: String,
    /// The key's full head set after the change, in version order.
    pub heads: Vec<Head>,
}

/// Live subscription to head-set changes of one key-value view.
///
/// Delivered through a bounded drop-oldest buffer; dropping the handle
/// unsubscribes.
pub struct KvWatch {
    rx: DeliveryReceiver<KvUpdate>,
}

impl KvWatch {
    pub(crate) fn new(rx: DeliveryReceiver<KvUpdate>) -> Self {
        Self { rx }
    }

    /// Blocks for the next update. `None` once the view is gone.
    pub fn recv(&self) -> Option<KvUpdate> {
        self.rx.recv()
    }

    /// Like `recv` with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<KvUpdate> {
        self.rx.recv_timeout(timeout)
    }

    /// Returns a buffered update if one is pending.
    pub fn try_recv(&self) -> Option<KvUpdate> {
        self.rx.try_recv()
    }

    /// Number of updates discarded because this consumer was slow.
    pub fn dropped(&self) -> u64 {
        self.rx.dropped()
    }
}

/// Head-set state for one key-value view.
#[derive(Default)]
pub(crate) struct KvView {
    heads: HashMap<String, BTreeSet<Version>>,
    /// Versions some other version has linked to, per key. A version
    /// in this set never (re)enters the head set, regardless of
    /// arrival order.
    superseded: HashMap<String, HashSet<Version>>,
    payloads: HashMap<Version, Vec<u8>>,
}

impl KvView {
    /// Applies one operation; returns the update if the head set for
    /// the key changed.
    pub(crate) fn apply(&mut self, op: &KvOp, payload: &[u8]) -> Option<KvUpdate> {
        self.payloads.insert(op.version, payload.to_vec());

        let heads = self.heads.entry(op.key.clone()).or_default();
        let superseded = self.superseded.entry(op.key.clone()).or_default();

        let mut changed = false;
        if !superseded.contains(&op.version) && heads.insert(op.version) {
            changed = true;
        }
        for link in &op.links {
            superseded.insert(*link);
            if heads.remove(link) {
                changed = true;
            }
        }

        changed.then(|| KvUpdate {
            key: op.key.clone(),
            heads: self.get(&op.key),
        })
    }

    /// Returns the current heads for `key`, in version order.
    ///
    /// Empty for unknown keys; more than one element signals
    /// concurrent writes.
    pub(crate) fn get(&self, key: &str) -> Vec<Head> {
        self.heads
            .get(key)
            .into_iter()
            .flatten()
            .map(|version| Head {
                version: *version,
                payload: self.payloads.get(version).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Discards all state, ready for a rebuild.
    pub(crate) fn clear(&mut self) {
        self.heads.clear();
        self.superseded.clear();
        self.payloads.clear();
    }
}
