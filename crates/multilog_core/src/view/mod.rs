//! Materialized views over the merged entry stream.
//!
//! A view is a named index derived by folding every known entry
//! through a pure map function. Two index shapes are supported: an
//! ordered list (sorted by a derived key) and a causal key-value map
//! (last-writer-wins head tracking over declared links).
//!
//! Views are rebuildable: replaying all feeds from sequence 0 in
//! registry order must reproduce identical view contents, which is
//! why map functions have to be deterministic.

mod engine;
mod kv;
mod list;
mod map;

pub use engine::Engine;
pub use kv::{Head, KvUpdate, KvWatch};
pub use map::{KvOp, ViewMap, ViewOps};

pub(crate) use kv::KvView;
pub(crate) use list::ListView;
