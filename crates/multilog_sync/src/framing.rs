//! Length-prefixed message framing.
//!
//! Each frame is a 4-byte big-endian length followed by that many
//! payload bytes. Frames above the configured limit are rejected
//! before any payload is read, so a corrupt or hostile length cannot
//! force a huge allocation.

use crate::error::{SyncError, SyncResult};
use std::io::{Read, Write};

const LEN_PREFIX: usize = 4;

/// Writes one frame.
///
/// # Errors
///
/// Returns [`SyncError::FrameTooLarge`] if the payload exceeds `max`,
/// or the I/O error if the write fails.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8], max: usize) -> SyncResult<()> {
    if payload.len() > max {
        return Err(SyncError::FrameTooLarge {
            len: payload.len(),
            max,
        });
    }
    let len = u32::try_from(payload.len()).map_err(|_| SyncError::FrameTooLarge {
        len: payload.len(),
        max,
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Reads one frame.
///
/// Returns `Ok(None)` on a clean end of stream (no bytes of a next
/// frame read). An end of stream inside a frame is an error: the peer
/// went away mid-message.
pub fn read_frame<R: Read>(reader: &mut R, max: usize) -> SyncResult<Option<Vec<u8>>> {
    let mut prefix = [0u8; LEN_PREFIX];
    let first = reader.read(&mut prefix)?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut prefix[first..])?;

    let len = u32::from_be_bytes(prefix) as usize;
    if len > max {
        return Err(SyncError::FrameTooLarge { len, max });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MAX: usize = 1024;

    #[test]
    fn frame_roundtrip() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"hello", MAX).unwrap();
        write_frame(&mut buffer, b"", MAX).unwrap();
        write_frame(&mut buffer, b"world", MAX).unwrap();

        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_frame(&mut cursor, MAX).unwrap().unwrap(), b"hello");
        assert_eq!(read_frame(&mut cursor, MAX).unwrap().unwrap(), b"");
        assert_eq!(read_frame(&mut cursor, MAX).unwrap().unwrap(), b"world");
        assert!(read_frame(&mut cursor, MAX).unwrap().is_none());
    }

    #[test]
    fn oversized_payload_rejected_on_write() {
        let mut buffer = Vec::new();
        let result = write_frame(&mut buffer, &[0u8; 16], 8);
        assert!(matches!(
            result,
            Err(SyncError::FrameTooLarge { len: 16, max: 8 })
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn oversized_length_rejected_on_read() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &[0u8; 16], MAX).unwrap();

        let mut cursor = Cursor::new(buffer);
        assert!(matches!(
            read_frame(&mut cursor, 8),
            Err(SyncError::FrameTooLarge { len: 16, max: 8 })
        ));
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"hello", MAX).unwrap();
        buffer.truncate(buffer.len() - 2);

        let mut cursor = Cursor::new(buffer);
        assert!(matches!(read_frame(&mut cursor, MAX), Err(SyncError::Io(_))));
    }

    #[test]
    fn truncated_prefix_is_an_error() {
        let mut cursor = Cursor::new(vec![0u8, 0u8]);
        assert!(matches!(read_frame(&mut cursor, MAX), Err(SyncError::Io(_))));
    }
}
