//! Bounded drop-oldest queues for subscription delivery.
//!
//! Slow consumers must never backpressure the append or replication
//! paths, so every live subscription gets its own bounded buffer and
//! the oldest item is discarded when it fills. Staleness beats
//! stalling for UI-style consumers.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

struct Shared<T> {
    state: Mutex<State<T>>,
    available: Condvar,
}

struct State<T> {
    queue: VecDeque<T>,
    capacity: usize,
    dropped: u64,
    sender_gone: bool,
    receiver_gone: bool,
}

/// Creates a bounded drop-oldest queue with the given capacity.
///
/// A zero capacity is treated as 1.
pub(crate) fn bounded<T>(capacity: usize) -> (DeliverySender<T>, DeliveryReceiver<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
            sender_gone: false,
            receiver_gone: false,
        }),
        available: Condvar::new(),
    });
    (
        DeliverySender {
            shared: Arc::clone(&shared),
        },
        DeliveryReceiver { shared },
    )
}

/// Producer half of a delivery queue.
pub(crate) struct DeliverySender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> DeliverySender<T> {
    /// Enqueues an item, discarding the oldest one if the buffer is
    /// full. Returns false once the receiver is gone.
    pub(crate) fn send(&self, item: T) -> bool {
        let mut state = self.shared.state.lock();
        if state.receiver_gone {
            return false;
        }
        if state.queue.len() == state.capacity {
            state.queue.pop_front();
            state.dropped += 1;
        }
        state.queue.push_back(item);
        drop(state);
        self.shared.available.notify_one();
        true
    }
}

impl<T> Drop for DeliverySender<T> {
    fn drop(&mut self) {
        self.shared.state.lock().sender_gone = true;
        self.shared.available.notify_all();
    }
}

/// Consumer half of a delivery queue.
pub(crate) struct DeliveryReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> DeliveryReceiver<T> {
    /// Blocks until an item is available. Returns `None` once the
    /// sender is gone and the buffer is drained.
    pub(crate) fn recv(&self) -> Option<T> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(item) = state.queue.pop_front() {
                return Some(item);
            }
            if state.sender_gone {
                return None;
            }
            self.shared.available.wait(&mut state);
        }
    }

    /// Like `recv` but gives up after `timeout`.
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(item) = state.queue.pop_front() {
                return Some(item);
            }
            if state.sender_gone {
                return None;
            }
            if self
                .shared
                .available
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.queue.pop_front();
            }
        }
    }

    /// Returns an item if one is already buffered.
    pub(crate) fn try_recv(&self) -> Option<T> {
        self.shared.state.lock().queue.pop_front()
    }

    /// Number of items discarded because this consumer was slow.
    pub(crate) fn dropped(&self) -> u64 {
        self.shared.state.lock().dropped
    }
}

impl<T> Drop for DeliveryReceiver<T> {
    fn drop(&mut self) {
        self.shared.state.lock().receiver_gone = true;
    }
}
