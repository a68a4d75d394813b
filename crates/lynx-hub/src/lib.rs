use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use lynx_types::models::Pin;

/// Per-subscriber queue depth. A subscriber that falls this far behind is
/// dropped rather than allowed to stall the publisher.
const SUBSCRIBER_CAPACITY: usize = 200;

/// Fans newly created pins out to all connected stream clients.
///
/// Each subscriber owns a bounded mpsc channel. `publish` never blocks:
/// a full or closed channel gets its subscriber unregistered on the spot.
/// Delivery is at-most-once, best-effort. The registry lock is independent
/// of the store's write lock, so fan-out never serializes behind storage
/// I/O.
#[derive(Clone, Default)]
pub struct PinHub {
    inner: Arc<Mutex<HashMap<Uuid, mpsc::Sender<Pin>>>>,
}

impl PinHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. The returned handle receives every pin
    /// published after this call and unregisters itself on drop.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.inner
            .lock()
            .expect("hub lock poisoned")
            .insert(id, tx);
        debug!("Stream subscriber {} registered", id);
        Subscription {
            id,
            rx,
            hub: self.clone(),
        }
    }

    /// Deliver a pin to every registered subscriber without blocking.
    /// Subscribers whose queue is full, or whose receiver is gone, are
    /// dropped and unregistered.
    pub fn publish(&self, pin: &Pin) {
        let mut subs = self.inner.lock().expect("hub lock poisoned");
        let mut dead = Vec::new();

        for (id, tx) in subs.iter() {
            match tx.try_send(pin.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Stream subscriber {} fell behind, dropping", id);
                    dead.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(*id);
                }
            }
        }

        for id in dead {
            subs.remove(&id);
        }
    }

    /// Remove a subscriber. Safe to call repeatedly or after the channel is
    /// already gone.
    pub fn unsubscribe(&self, id: Uuid) {
        if self
            .inner
            .lock()
            .expect("hub lock poisoned")
            .remove(&id)
            .is_some()
        {
            debug!("Stream subscriber {} unregistered", id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("hub lock poisoned").len()
    }
}

/// A live subscription to the hub. Dropping it unregisters the channel,
/// so a disconnected client never leaks a stale queue.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<Pin>,
    hub: PinHub,
}

impl Subscription {
    /// Await the next published pin. Returns `None` once the subscriber has
    /// been dropped by the hub and the queue is drained.
    pub async fn recv(&mut self) -> Option<Pin> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Pin> {
        self.rx.try_recv().ok()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lynx_types::models::Pin;

    fn pin(title: &str) -> Pin {
        Pin {
            id: Uuid::new_v4(),
            kind: "person".into(),
            title: title.into(),
            notes: String::new(),
            lat: 40.0,
            lng: -74.0,
            severity: 3,
            created_at: chrono::Utc::now(),
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn subscriber_receives_exactly_one_message_per_publish() {
        let hub = PinHub::new();
        let mut sub = hub.subscribe();

        let p = pin("John Doe");
        hub.publish(&p);

        let got = sub.recv().await.unwrap();
        assert_eq!(got.id, p.id);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_history() {
        let hub = PinHub::new();
        hub.publish(&pin("before"));

        let mut sub = hub.subscribe();
        assert!(sub.try_recv().is_none());

        hub.publish(&pin("after"));
        assert_eq!(sub.recv().await.unwrap().title, "after");
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_not_blocked() {
        let hub = PinHub::new();
        let mut slow = hub.subscribe();
        let mut healthy = hub.subscribe();

        // Fill the slow subscriber's queue and push one past capacity.
        for i in 0..=SUBSCRIBER_CAPACITY {
            hub.publish(&pin(&format!("p{}", i)));
            if i < SUBSCRIBER_CAPACITY {
                // Keep the healthy subscriber drained.
                assert!(healthy.recv().await.is_some());
            }
        }

        assert_eq!(hub.subscriber_count(), 1);

        // The slow subscriber still drains what it buffered, then ends.
        for _ in 0..SUBSCRIBER_CAPACITY {
            assert!(slow.recv().await.is_some());
        }
        assert!(slow.recv().await.is_none());

        // The healthy one got the overflow publish too.
        assert!(healthy.recv().await.is_some());
    }

    #[tokio::test]
    async fn unsubscribe_is_safe_to_repeat() {
        let hub = PinHub::new();
        let sub = hub.subscribe();
        let id = sub.id();

        hub.unsubscribe(id);
        hub.unsubscribe(id);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters_it() {
        let hub = PinHub::new();
        {
            let _sub = hub.subscribe();
            assert_eq!(hub.subscriber_count(), 1);
        }
        assert_eq!(hub.subscriber_count(), 0);

        // Publishing after the drop reaches nobody and does not panic.
        hub.publish(&pin("into the void"));
    }
}
