//! # Multilog Core
//!
//! Multi-writer append-only feeds with materialized views.
//!
//! Each participant owns one append-only sequence of immutable entries
//! (a [`Feed`]). A [`Registry`] tracks every feed known to a process,
//! local and remote-mirrored alike. An [`Engine`] folds the merged
//! entry stream through deterministic map functions into queryable
//! views: an ordered list index and a causal key-value index with
//! last-writer-wins head tracking.
//!
//! This crate provides:
//! - [`Feed`] - one writer's gapless, immutable entry sequence
//! - [`Registry`] - the set of known feeds with stable discovery order
//! - [`Engine`] - incremental view indexing with deterministic rebuild
//! - [`Tail`] - live "last N" windows over feeds and list views
//!
//! Replication between processes lives in `multilog_sync`; this crate
//! only exposes the mirror-append seam ([`Feed::apply`]) it uses.
//!
//! ## Example
//!
//! ```rust
//! use multilog_core::{Engine, ViewOps};
//!
//! let engine = Engine::in_memory();
//! engine
//!     .register_view("by_payload", |entry: &multilog_core::Entry| ViewOps::List {
//!         sort_key: entry.payload.clone(),
//!     })
//!     .unwrap();
//!
//! let feed = engine.local("default").unwrap();
//! feed.append(b"b").unwrap();
//! feed.append(b"a").unwrap();
//!
//! engine.sync_views().unwrap();
//! let values = engine.list("by_payload").unwrap();
//! assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec()]);
//! ```

mod delivery;
mod error;
mod feed;
mod registry;
mod tail;
mod types;
mod view;

pub use error::{CoreError, CoreResult};
pub use feed::{Feed, FeedReader};
pub use registry::Registry;
pub use tail::{tail_feed, Tail, Window};
pub use types::{Entry, ParseVersionError, Version, WriterId};
pub use view::{Engine, Head, KvOp, KvUpdate, KvWatch, ViewMap, ViewOps};
