//! # Multilog Storage
//!
//! Entry store trait and implementations for Multilog feeds.
//!
//! A feed is one writer's append-only sequence of immutable entries,
//! numbered from 0 with no gaps. This crate provides the lowest-level
//! persistence abstraction for such a sequence: append the next entry,
//! read an entry back by sequence number, report the current length.
//!
//! Stores are **opaque payload stores** - they do not interpret the
//! bytes they hold. Feed semantics (versions, views, replication) live
//! in `multilog_core`.
//!
//! ## Available stores
//!
//! - [`MemoryStore`] - For testing and ephemeral feeds
//! - [`FileStore`] - For persistent feeds using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use multilog_storage::{EntryStore, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! store.put(0, b"hello").unwrap();
//! assert_eq!(store.len().unwrap(), 1);
//! assert_eq!(store.get(0).unwrap(), b"hello");
//! ```

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::EntryStore;
