//! # Multilog Sync
//!
//! Replication for `multilog_core` feed registries.
//!
//! A [`Session`] connects two registries over any `Read`/`Write` byte
//! stream pair and keeps them converged: every feed either end holds
//! ends up mirrored on the other, entry for entry, live as new entries
//! are appended. The protocol is symmetric (no client/server roles)
//! and idempotent, so overlapping sessions between the same peers are
//! safe.
//!
//! Wire format: CBOR messages ([`WireMessage`]) in length-prefixed
//! frames ([`read_frame`]/[`write_frame`]). For in-process wiring and
//! tests, [`duplex`] provides a connected pair of byte streams.
//!
//! ## Example
//!
//! ```rust
//! use multilog_core::Registry;
//! use multilog_sync::{duplex, Session, SyncConfig};
//!
//! let ours = Registry::in_memory();
//! let theirs = Registry::in_memory();
//! let feed = ours.local("chat").unwrap();
//! feed.append(b"hello").unwrap();
//!
//! let (our_end, their_end) = duplex();
//! let _a = Session::spawn(SyncConfig::new(), ours, our_end.0, our_end.1).unwrap();
//! let _b = Session::spawn(SyncConfig::new(), theirs.clone(), their_end.0, their_end.1).unwrap();
//!
//! // `theirs` now converges towards a mirror of `feed`.
//! # let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
//! # while !matches!(theirs.len_of(feed.writer_id()), Ok(1)) {
//! #     assert!(std::time::Instant::now() < deadline);
//! #     std::thread::sleep(std::time::Duration::from_millis(10));
//! # }
//! ```

mod config;
mod error;
mod framing;
mod messages;
mod session;
mod transport;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use framing::{read_frame, write_frame};
pub use messages::{FeedAd, WireMessage};
pub use session::Session;
pub use transport::{duplex, pipe, PipeReader, PipeWriter};
