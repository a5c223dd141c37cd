//! Wire messages for feed replication.
//!
//! Three message kinds carry the whole protocol:
//!
//! - `Advertise` announces feeds and their lengths
//! - `Request` asks for a feed's entries from a sequence onward
//! - `Data` carries one replicated entry
//!
//! Messages are CBOR-encoded and carried inside length-prefixed frames
//! (see [`crate::framing`]). The protocol is symmetric: both ends send
//! and handle every kind.

use crate::error::SyncResult;
use multilog_core::{Entry, WriterId};
use serde::{Deserialize, Serialize};

/// One advertised feed: its writer and current length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAd {
    /// The advertised feed's writer identity.
    pub writer: WriterId,
    /// Number of entries the sender holds.
    pub len: u64,
}

/// A replication protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    /// Announces feeds the sender holds.
    Advertise {
        /// The advertised feeds.
        feeds: Vec<FeedAd>,
    },
    /// Requests a feed's entries from `from` onward, stored and live.
    Request {
        /// The requested feed's writer identity.
        writer: WriterId,
        /// First wanted sequence number.
        from: u64,
    },
    /// Carries one replicated entry.
    Data {
        /// The entry.
        entry: Entry,
    },
}

impl WireMessage {
    /// Encodes the message to CBOR.
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }

    /// Decodes a message from CBOR.
    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        Ok(ciborium::from_reader(bytes)?)
    }

    /// Returns the message kind name, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Advertise { .. } => "advertise",
            WireMessage::Request { .. } => "request",
            WireMessage::Data { .. } => "data",
        }
    }
}
