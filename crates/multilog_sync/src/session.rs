//! Replication sessions.
//!
//! A [`Session`] replicates feeds with one peer over a `Read`/`Write`
//! byte stream pair. The protocol is symmetric: each end advertises
//! the feeds it holds, requests entries it is missing, and streams
//! entries the peer asked for, stored first and then live as they are
//! appended.
//!
//! Sessions only ever advance mirrors. Local feeds are advertised and
//! streamed but never written by a peer, so a misbehaving peer cannot
//! corrupt locally authored history. Entries arriving out of order
//! (overlapping sessions can interleave) are held in a bounded
//! per-writer gap buffer until the missing entries fill the gap.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::framing;
use crate::messages::{FeedAd, WireMessage};
use multilog_core::{CoreError, Entry, Feed, Registry, WriterId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often blocked worker threads re-check the closed flag.
const POLL: Duration = Duration::from_millis(100);

struct SessionShared {
    config: SyncConfig,
    registry: Registry,
    writer: Mutex<Box<dyn Write + Send>>,
    /// Out-of-order entries per writer, keyed by sequence.
    gaps: Mutex<HashMap<WriterId, BTreeMap<u64, Entry>>>,
    closed: AtomicBool,
}

impl SessionShared {
    fn send(&self, message: &WireMessage) -> SyncResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::Closed);
        }
        let bytes = message.encode()?;
        let mut writer = self.writer.lock();
        framing::write_frame(&mut *writer, &bytes, self.config.max_frame_len)?;
        writer.flush()?;
        Ok(())
    }

    fn handle(self: &Arc<Self>, message: WireMessage) -> SyncResult<()> {
        match message {
            WireMessage::Advertise { feeds } => {
                for ad in feeds {
                    let feed = self.registry.mirror(ad.writer)?;
                    if feed.is_writable() {
                        // Our own feed reflected back.
                        continue;
                    }
                    // Request unconditionally: even at equal lengths
                    // this subscribes us to the peer's future appends.
                    let from = feed.len()?;
                    self.send(&WireMessage::Request {
                        writer: ad.writer,
                        from,
                    })?;
                }
                Ok(())
            }
            WireMessage::Request { writer, from } => {
                let Some(feed) = self.registry.get(writer) else {
                    return Err(SyncError::protocol(format!(
                        "peer requested unadvertised feed {writer}"
                    )));
                };
                self.spawn_forwarder(feed, from);
                Ok(())
            }
            WireMessage::Data { entry } => self.handle_data(entry),
        }
    }

    fn spawn_forwarder(self: &Arc<Self>, feed: Feed, from: u64) {
        let shared = Arc::clone(self);
        thread::spawn(move || {
            if let Err(error) = shared.forward_entries(&feed, from) {
                tracing::debug!(
                    writer = %feed.writer_id(),
                    error = %error,
                    "entry forwarding stopped"
                );
            }
        });
    }

    /// Streams `feed` to the peer from `from` onward, then follows
    /// live appends until the session closes or the peer goes away.
    fn forward_entries(&self, feed: &Feed, from: u64) -> SyncResult<()> {
        // Subscribe before the stored scan so no append slips between
        // catch-up and going live.
        let live = feed.subscribe();
        let mut next = from;
        self.send_stored(feed, &mut next)?;
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Ok(());
            }
            match live.recv_timeout(POLL) {
                Ok(entry) => {
                    if entry.sequence < next {
                        continue;
                    }
                    self.send_stored(feed, &mut next)?;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    fn send_stored(&self, feed: &Feed, next: &mut u64) -> SyncResult<()> {
        while *next < feed.len()? {
            let entry = feed.get(*next)?;
            self.send(&WireMessage::Data { entry })?;
            *next += 1;
        }
        Ok(())
    }

    fn handle_data(&self, entry: Entry) -> SyncResult<()> {
        let feed = self.registry.mirror(entry.writer)?;
        if feed.is_writable() {
            if entry.sequence < feed.len()? {
                // Echo of an entry we authored; harmless.
                return Ok(());
            }
            return Err(SyncError::protocol(
                "peer sent unknown entries for a locally owned feed",
            ));
        }

        match feed.apply(entry.clone()) {
            Ok(true) => self.drain_gaps(&feed),
            Ok(false) => Ok(()),
            Err(CoreError::NonContiguousAppend { .. }) => self.buffer_gap(entry),
            Err(error) => Err(error.into()),
        }
    }

    fn buffer_gap(&self, entry: Entry) -> SyncResult<()> {
        let mut gaps = self.gaps.lock();
        let buffer = gaps.entry(entry.writer).or_default();
        if buffer.len() >= self.config.gap_buffer_entries
            && !buffer.contains_key(&entry.sequence)
        {
            return Err(SyncError::GapBufferOverflow {
                writer: entry.writer,
                buffered: buffer.len(),
            });
        }
        tracing::trace!(
            writer = %entry.writer,
            sequence = entry.sequence,
            "buffered out-of-order entry"
        );
        buffer.insert(entry.sequence, entry);
        Ok(())
    }

    /// Applies buffered entries that have become contiguous.
    fn drain_gaps(&self, feed: &Feed) -> SyncResult<()> {
        let writer = feed.writer_id();
        let mut gaps = self.gaps.lock();
        let Some(buffer) = gaps.get_mut(&writer) else {
            return Ok(());
        };
        loop {
            let next = feed.len()?;
            let Some(entry) = buffer.remove(&next) else {
                break;
            };
            feed.apply(entry)?;
        }
        let len = feed.len()?;
        buffer.retain(|sequence, _| *sequence >= len);
        if buffer.is_empty() {
            gaps.remove(&writer);
        }
        Ok(())
    }
}

/// A live replication session with one peer.
///
/// Dropping the session closes it; worker threads notice and exit on
/// their next poll.
pub struct Session {
    shared: Arc<SessionShared>,
}

impl Session {
    /// Starts a session over the given byte streams.
    ///
    /// Immediately advertises every feed the registry holds, then
    /// handles peer messages on a background thread. Feeds discovered
    /// later (locally created or learned from other sessions) are
    /// advertised as they appear, unless disabled in the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial advertisement cannot be
    /// written.
    pub fn spawn<R, W>(
        config: SyncConfig,
        registry: Registry,
        reader: R,
        writer: W,
    ) -> SyncResult<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let shared = Arc::new(SessionShared {
            config,
            registry,
            writer: Mutex::new(Box::new(writer)),
            gaps: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });

        let mut ads = Vec::new();
        let mut known = HashSet::new();
        for feed in shared.registry.feeds() {
            known.insert(feed.writer_id());
            ads.push(FeedAd {
                writer: feed.writer_id(),
                len: feed.len()?,
            });
        }
        shared.send(&WireMessage::Advertise { feeds: ads })?;

        {
            let shared = Arc::clone(&shared);
            let mut reader = reader;
            thread::spawn(move || {
                if let Err(error) = run_reader(&shared, &mut reader) {
                    tracing::warn!(error = %error, "replication session failed");
                }
                shared.closed.store(true, Ordering::SeqCst);
            });
        }

        if shared.config.advertise_on_discovery {
            let feeds_rx = shared.registry.watch_feeds();
            let shared = Arc::clone(&shared);
            thread::spawn(move || loop {
                if shared.closed.load(Ordering::SeqCst) {
                    break;
                }
                match feeds_rx.recv_timeout(POLL) {
                    Ok(feed) => {
                        // The watcher replays feeds covered by the
                        // initial advertisement; skip those once.
                        if known.remove(&feed.writer_id()) {
                            continue;
                        }
                        let ad = match feed.len() {
                            Ok(len) => FeedAd {
                                writer: feed.writer_id(),
                                len,
                            },
                            Err(error) => {
                                tracing::warn!(
                                    writer = %feed.writer_id(),
                                    error = %error,
                                    "cannot advertise feed"
                                );
                                continue;
                            }
                        };
                        if shared
                            .send(&WireMessage::Advertise { feeds: vec![ad] })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            });
        }

        Ok(Self { shared })
    }

    /// Returns the registry this session replicates.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// Closes the session. Worker threads exit on their next poll.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    /// Returns true once the session has closed or failed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_reader<R: Read>(shared: &Arc<SessionShared>, reader: &mut R) -> SyncResult<()> {
    while !shared.closed.load(Ordering::SeqCst) {
        let Some(frame) = framing::read_frame(reader, shared.config.max_frame_len)? else {
            return Ok(());
        };
        let message = WireMessage::decode(&frame)?;
        tracing::trace!(kind = message.kind(), "handling message");
        shared.handle(message)?;
    }
    Ok(())
}
