//! In-memory transport plumbing.
//!
//! Sessions run over any `Read`/`Write` pair, so a `TcpStream` (with
//! `try_clone` for the two halves) works directly. For tests and
//! in-process wiring this module provides a blocking byte pipe and a
//! crossed pair of them.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

struct PipeState {
    buffer: VecDeque<u8>,
    writer_gone: bool,
    reader_gone: bool,
}

struct PipeShared {
    state: Mutex<PipeState>,
    available: Condvar,
}

/// Creates a unidirectional in-memory byte pipe.
///
/// Reads block until bytes arrive; dropping the writer ends the stream
/// cleanly, and writing after the reader is gone fails with
/// `BrokenPipe`.
#[must_use]
pub fn pipe() -> (PipeWriter, PipeReader) {
    let shared = Arc::new(PipeShared {
        state: Mutex::new(PipeState {
            buffer: VecDeque::new(),
            writer_gone: false,
            reader_gone: false,
        }),
        available: Condvar::new(),
    });
    (
        PipeWriter {
            shared: Arc::clone(&shared),
        },
        PipeReader { shared },
    )
}

/// Creates two connected endpoints: what one writes, the other reads.
#[must_use]
pub fn duplex() -> ((PipeReader, PipeWriter), (PipeReader, PipeWriter)) {
    let (left_tx, right_rx) = pipe();
    let (right_tx, left_rx) = pipe();
    ((left_rx, left_tx), (right_rx, right_tx))
}

/// Write half of an in-memory pipe.
pub struct PipeWriter {
    shared: Arc<PipeShared>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.state.lock();
        if state.reader_gone {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe reader closed",
            ));
        }
        state.buffer.extend(buf);
        drop(state);
        self.shared.available.notify_one();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.state.lock().writer_gone = true;
        self.shared.available.notify_all();
    }
}

/// Read half of an in-memory pipe.
pub struct PipeReader {
    shared: Arc<PipeShared>,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.state.lock();
        loop {
            if !state.buffer.is_empty() {
                let n = buf.len().min(state.buffer.len());
                for (slot, byte) in buf.iter_mut().zip(state.buffer.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if state.writer_gone {
                return Ok(0);
            }
            self.shared.available.wait(&mut state);
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.shared.state.lock().reader_gone = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn bytes_flow_through() {
        let (mut tx, mut rx) = pipe();
        tx.write_all(b"abc").unwrap();

        let mut buf = [0u8; 3];
        rx.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn read_blocks_until_write() {
        let (mut tx, mut rx) = pipe();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 1];
            rx.read_exact(&mut buf).unwrap();
            buf[0]
        });

        thread::sleep(std::time::Duration::from_millis(10));
        tx.write_all(&[7]).unwrap();
        assert_eq!(handle.join().unwrap(), 7);
    }

    #[test]
    fn writer_drop_ends_stream() {
        let (tx, mut rx) = pipe();
        drop(tx);

        let mut buf = [0u8; 1];
        assert_eq!(rx.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_after_reader_drop_fails() {
        let (mut tx, rx) = pipe();
        drop(rx);
        assert!(tx.write(b"x").is_err());
    }

    #[test]
    fn duplex_ends_are_crossed() {
        let ((mut left_rx, mut left_tx), (mut right_rx, mut right_tx)) = duplex();

        left_tx.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        right_rx.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        right_tx.write_all(b"pong").unwrap();
        left_rx.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }
}
