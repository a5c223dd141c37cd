//! Writer identities, versions and entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable identifier for a feed's writer.
///
/// 16 opaque bytes. The original system derives this from a
/// cryptographic key; any unique byte string works, so freshly created
/// local feeds use a random UUID. Immutable once a feed exists.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WriterId([u8; 16]);

impl WriterId {
    /// Generates a fresh random identity for a new local feed.
    #[must_use]
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Creates an identity from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw identity bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the identity as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses an identity from its hex form.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let bytes: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for WriterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for WriterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WriterId({}..)", &self.to_hex()[..8])
    }
}

/// Error returned when parsing a [`Version`] from text fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid version string: expected <hex writer>@<sequence>")]
pub struct ParseVersionError;

/// Causal pointer to one immutable entry: `writer@sequence`.
///
/// Used inside key-value view operations to declare which entry a new
/// one supersedes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    /// The feed that owns the entry.
    pub writer: WriterId,
    /// The entry's sequence number within that feed.
    pub sequence: u64,
}

impl Version {
    /// Creates a version pointer.
    #[must_use]
    pub const fn new(writer: WriterId, sequence: u64) -> Self {
        Self { writer, sequence }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.writer, self.sequence)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (writer, sequence) = s.split_once('@').ok_or(ParseVersionError)?;
        let writer = WriterId::from_hex(writer).ok_or(ParseVersionError)?;
        let sequence = sequence.parse().map_err(|_| ParseVersionError)?;
        Ok(Self { writer, sequence })
    }
}

/// One immutable entry in a feed.
///
/// Entries are assigned their sequence number by the owning feed at
/// append time and are never mutated, reordered or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// The feed that owns this entry.
    pub writer: WriterId,
    /// 0-based, gapless sequence number within the feed.
    pub sequence: u64,
    /// Opaque application payload.
    pub payload: Vec<u8>,
}

impl Entry {
    /// Creates an entry.
    #[must_use]
    pub fn new(writer: WriterId, sequence: u64, payload: Vec<u8>) -> Self {
        Self {
            writer,
            sequence,
            payload,
        }
    }

    /// Returns this entry's version pointer.
    #[must_use]
    pub fn version(&self) -> Version {
        Version::new(self.writer, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_id_hex_roundtrip() {
        let id = WriterId::random();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        assert_eq!(WriterId::from_hex(&hex), Some(id));
    }

    #[test]
    fn writer_id_from_bad_hex() {
        assert_eq!(WriterId::from_hex("zz"), None);
        assert_eq!(WriterId::from_hex("abcd"), None); // too short
    }

    #[test]
    fn version_display_and_parse() {
        let writer = WriterId::from_bytes([0xab; 16]);
        let version = Version::new(writer, 42);

        let text = version.to_string();
        assert!(text.ends_with("@42"));
        assert_eq!(text.parse::<Version>().unwrap(), version);
    }

    #[test]
    fn version_parse_rejects_garbage() {
        assert!("not-a-version".parse::<Version>().is_err());
        assert!("abcd@7".parse::<Version>().is_err()); // writer too short
        assert!(format!("{}@x", WriterId::random())
            .parse::<Version>()
            .is_err());
    }

    #[test]
    fn version_orders_by_writer_then_sequence() {
        let a = WriterId::from_bytes([1; 16]);
        let b = WriterId::from_bytes([2; 16]);

        assert!(Version::new(a, 9) < Version::new(b, 0));
        assert!(Version::new(a, 1) < Version::new(a, 2));
    }

    #[test]
    fn entry_version() {
        let writer = WriterId::random();
        let entry = Entry::new(writer, 3, b"payload".to_vec());
        assert_eq!(entry.version(), Version::new(writer, 3));
    }
}
