//! Event infrastructure for gossip-core.
//!
//! `ClusterEvent` reports membership and replication changes;
//! `EventBus` delivers them to subscribers. Wrap the bus in `Arc`.

use crate::membership::PeerAddress;
use crate::PeerId;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Cluster events emitted by the engine for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClusterEvent {
    /// A peer was adopted into the directory.
    PeerJoined {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        address: PeerAddress,
    },
    /// A peer aged out of the directory.
    PeerEvicted {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
    /// Incoming gossip replaced or added these keys.
    ValuesMerged { keys: Vec<String> },
    /// An inbound datagram was discarded.
    MessageDropped { reason: String },
}

/// Subscription handle that unsubscribes automatically when dropped.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

type Callback = Arc<dyn Fn(ClusterEvent) + Send + Sync>;

/// Event bus for publishing cluster events to subscribers.
#[derive(Default)]
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Callback)>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(ClusterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // try_write: Drop may run while emit holds the read lock during unwinding
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: ClusterEvent) {
        // Snapshot so a callback may subscribe without deadlocking
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn evicted(id: &str) -> ClusterEvent {
        ClusterEvent::PeerEvicted {
            peer_id: id.parse().unwrap(),
        }
    }

    #[test]
    fn test_subscribe_and_emit() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let _sub = bus.subscribe(move |event| seen_clone.lock().unwrap().push(event));
        bus.emit(evicted("a"));

        assert_eq!(*seen.lock().unwrap(), vec![evicted("a")]);
    }

    #[test]
    fn test_subscription_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));

        {
            let count_clone = Arc::clone(&count);
            let _sub = bus.subscribe(move |_| {
                count_clone.fetch_add(1, Ordering::Relaxed);
            });
            bus.emit(evicted("a"));
            assert_eq!(bus.subscriber_count(), 1);
        }

        bus.emit(evicted("b"));
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_partial_unsubscribe() {
        let bus = Arc::new(EventBus::new());
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));
        let count1_clone = Arc::clone(&count1);
        let count2_clone = Arc::clone(&count2);

        let sub1 = bus.subscribe(move |_| {
            count1_clone.fetch_add(1, Ordering::Relaxed);
        });
        let _sub2 = bus.subscribe(move |_| {
            count2_clone.fetch_add(1, Ordering::Relaxed);
        });

        bus.emit(evicted("a"));
        drop(sub1);
        bus.emit(evicted("b"));

        assert_eq!(count1.load(Ordering::Relaxed), 1);
        assert_eq!(count2.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_callback_may_subscribe() {
        let bus = Arc::new(EventBus::new());
        let inner_subs = Arc::new(Mutex::new(Vec::new()));
        let bus_clone = Arc::clone(&bus);
        let subs_clone = Arc::clone(&inner_subs);

        let _sub = bus.subscribe(move |_| {
            let sub = bus_clone.subscribe(|_| {});
            subs_clone.lock().unwrap().push(sub);
        });
        bus.emit(evicted("a"));

        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_event_serialization() {
        let event = ClusterEvent::PeerJoined {
            peer_id: "node-b".parse().unwrap(),
            address: PeerAddress::new("127.0.0.1", 9001),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"peerJoined\""));
        assert!(json.contains("\"peerId\":\"node-b\""));
        assert!(json.contains("\"port\":9001"));
    }
}
