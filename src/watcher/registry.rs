//! Concurrency-safe subscriber membership and broadcast.
//!
//! The membership map is the only shared mutable state in the crate, and
//! every operation takes the one mutex. Broadcast holds it across the whole
//! fan-out, so a broadcast always observes a consistent snapshot of
//! membership: a subscriber added or removed concurrently either receives
//! the whole payload or nothing.
//!
//! Channel senders are not hashable, so channel identity is realized as a
//! registry-issued [`SubscriberId`] returned by [`SubscriberRegistry::subscribe`].
//! The registry never creates or destroys conduits; ownership stays with
//! the caller.

use std::collections::HashMap;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::debug_event;

/// Opaque identity of one registered conduit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct Membership {
    next_id: u64,
    channels: HashMap<SubscriberId, Sender<Vec<u8>>>,
}

/// Set of active subscriber conduits.
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Mutex<Membership>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conduit. O(1).
    pub fn subscribe(&self, conduit: Sender<Vec<u8>>) -> SubscriberId {
        let mut inner = self.inner.lock();
        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;
        inner.channels.insert(id, conduit);
        id
    }

    /// Remove a conduit. No-op if the id was never issued or already
    /// removed. O(1).
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.lock().channels.remove(&id);
    }

    /// Deliver an identical payload to every registered conduit.
    ///
    /// Blocking semantics: a full bounded conduit stalls the fan-out (and,
    /// transitively, the dispatch loop) until it drains. A conduit whose
    /// receiver has been dropped is skipped; membership changes only
    /// through `unsubscribe`.
    pub fn broadcast(&self, payload: &[u8]) {
        let inner = self.inner.lock();
        let mut delivered = 0usize;
        for conduit in inner.channels.values() {
            if conduit.send(payload.to_vec()).is_ok() {
                delivered += 1;
            }
        }
        debug_event!(
            "broadcast",
            "sent",
            "{} bytes to {delivered} of {} subscribers",
            payload.len(),
            inner.channels.len()
        );
    }

    /// Number of registered conduits.
    pub fn len(&self) -> usize {
        self.inner.lock().channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
