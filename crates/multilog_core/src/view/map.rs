//! The view map contract.

use crate::types::{Entry, Version};

/// Operations produced by folding one entry through a view map.
///
/// The variant decides which index the view maintains. A map function
/// must be deterministic: mapping the same entry twice must yield the
/// same operations, or view rebuilds would diverge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOps {
    /// The entry does not belong in this view.
    Skip,
    /// Insert the entry into the ordered list index under `sort_key`.
    ///
    /// Ties are broken by `(writer, sequence)` so list order is
    /// deterministic.
    List {
        /// Derived sort key, compared bytewise.
        sort_key: Vec<u8>,
    },
    /// Apply key-value head operations.
    Kv(Vec<KvOp>),
}

/// One key-value head operation.
///
/// Declares `version` as a candidate head for `key`, superseding every
/// version in `links`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvOp {
    /// Application key the operation targets.
    pub key: String,
    /// The version this operation introduces (normally the mapped
    /// entry's own version).
    pub version: Version,
    /// Versions this one supersedes.
    pub links: Vec<Version>,
}

impl KvOp {
    /// Creates a head operation.
    #[must_use]
    pub fn new(key: impl Into<String>, version: Version, links: Vec<Version>) -> Self {
        Self {
            key: key.into(),
            version,
            links,
        }
    }
}

/// A deterministic map from entries to view operations.
///
/// Implemented for any compatible closure.
pub trait ViewMap: Send + Sync {
    /// Maps one entry to the operations it contributes to this view.
    fn map(&self, entry: &Entry) -> ViewOps;
}

impl<F> ViewMap for F
where
    F: Fn(&Entry) -> ViewOps + Send + Sync,
{
    fn map(&self, entry: &Entry) -> ViewOps {
        self(entry)
    }
}
