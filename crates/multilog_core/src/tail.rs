//! Live "last N" windows over feeds and list views.

use crate::delivery::{self, DeliveryReceiver};
use crate::error::CoreResult;
use crate::feed::Feed;
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

/// Delivery buffer depth for tail subscriptions. Slow consumers lose
/// the oldest window first.
pub(crate) const TAIL_BUFFER: usize = 16;

/// One delivered tail window: the current last-N payloads in order.
pub type Window = Vec<Vec<u8>>;

/// A live tail subscription.
///
/// Delivers the current window immediately, then a fresh window each
/// time a qualifying entry arrives. Independent of every other
/// subscription; dropping the handle unsubscribes and releases its
/// buffer.
pub struct Tail {
    rx: DeliveryReceiver<Window>,
}

impl Tail {
    pub(crate) fn new(rx: DeliveryReceiver<Window>) -> Self {
        Self { rx }
    }

    /// Blocks for the next window. `None` once the source is gone
    /// (or immediately after the single window of an `n = 0` tail).
    pub fn recv(&self) -> Option<Window> {
        self.rx.recv()
    }

    /// Like `recv` with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Window> {
        self.rx.recv_timeout(timeout)
    }

    /// Returns a buffered window if one is pending.
    pub fn try_recv(&self) -> Option<Window> {
        self.rx.try_recv()
    }

    /// Number of windows discarded because this consumer was slow.
    pub fn dropped(&self) -> u64 {
        self.rx.dropped()
    }
}

/// Tails a raw feed: the last `n` payloads by append order, live.
///
/// `n = 0` yields one empty window and never updates (degenerate but
/// valid).
pub fn tail_feed(feed: &Feed, n: usize) -> CoreResult<Tail> {
    let (tx, rx) = delivery::bounded(TAIL_BUFFER);
    if n == 0 {
        tx.send(Window::new());
        return Ok(Tail::new(rx));
    }

    // Subscribe before the snapshot so no append can fall between.
    let sub = feed.subscribe();
    let len = feed.len()?;
    let start = len.saturating_sub(n as u64);
    let mut window = VecDeque::with_capacity(n);
    for sequence in start..len {
        window.push_back(feed.get(sequence)?.payload);
    }
    let mut next = len;
    tx.send(window.iter().cloned().collect());

    thread::spawn(move || {
        while let Ok(entry) = sub.recv() {
            // The subscription may replay entries the snapshot covered.
            if entry.sequence < next {
                continue;
            }
            next = entry.sequence + 1;
            window.push_back(entry.payload);
            while window.len() > n {
                window.pop_front();
            }
            if !tx.send(window.iter().cloned().collect()) {
                break;
            }
        }
    });

    Ok(Tail::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn initial_window_is_last_n_at_subscribe_time() {
        let registry = Registry::in_memory();
        let feed = registry.local("me").unwrap();
        for payload in [b"1", b"2", b"3", b"4"] {
            feed.append(payload).unwrap();
        }

        let tail = tail_feed(&feed, 3).unwrap();
        assert_eq!(
            tail.recv_timeout(WAIT).unwrap(),
            vec![b"2".to_vec(), b"3".to_vec(), b"4".to_vec()]
        );
    }

    #[test]
    fn window_slides_on_append() {
        let registry = Registry::in_memory();
        let feed = registry.local("me").unwrap();
        for payload in [b"1", b"2", b"3"] {
            feed.append(payload).unwrap();
        }

        let tail = tail_feed(&feed, 3).unwrap();
        tail.recv_timeout(WAIT).unwrap();

        feed.append(b"4").unwrap();
        assert_eq!(
            tail.recv_timeout(WAIT).unwrap(),
            vec![b"2".to_vec(), b"3".to_vec(), b"4".to_vec()]
        );
    }

    #[test]
    fn short_feed_yields_short_window() {
        let registry = Registry::in_memory();
        let feed = registry.local("me").unwrap();
        feed.append(b"only").unwrap();

        let tail = tail_feed(&feed, 5).unwrap();
        assert_eq!(tail.recv_timeout(WAIT).unwrap(), vec![b"only".to_vec()]);
    }

    #[test]
    fn zero_tail_is_empty_and_final() {
        let registry = Registry::in_memory();
        let feed = registry.local("me").unwrap();
        feed.append(b"x").unwrap();

        let tail = tail_feed(&feed, 0).unwrap();
        assert_eq!(tail.recv_timeout(WAIT).unwrap(), Window::new());

        feed.append(b"y").unwrap();
        assert_eq!(tail.recv(), None);
    }

    #[test]
    fn concurrent_tails_are_independent() {
        let registry = Registry::in_memory();
        let feed = registry.local("me").unwrap();
        feed.append(b"a").unwrap();

        let one = tail_feed(&feed, 1).unwrap();
        let two = tail_feed(&feed, 2).unwrap();
        one.recv_timeout(WAIT).unwrap();
        two.recv_timeout(WAIT).unwrap();

        feed.append(b"b").unwrap();
        assert_eq!(one.recv_timeout(WAIT).unwrap(), vec![b"b".to_vec()]);
        assert_eq!(
            two.recv_timeout(WAIT).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
    }
}
