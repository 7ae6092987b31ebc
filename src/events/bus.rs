//! # Event bus for broadcasting session events.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] sender. Publishing never waits.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                       Receivers (many):
//!   Session::dispatch ──┐               ┌──► service manager listener
//!   ServiceLoader     ──┼──► Bus ───────┼──► subscriber listener ──► SubscriberSet
//!   service runners   ──┘               └──► Session::subscribe() receivers
//! ```
//!
//! Every receiver shares one ring buffer of `capacity` events. A receiver that falls
//! behind gets `RecvError::Lagged(n)`; the session listeners log it and keep going.
//! Events published while nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel shared by everything attached to a session.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Bus holding up to `capacity` (at least 1) undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fire-and-forget; an event without receivers is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receivers(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receivers_only_see_events_after_subscribing() {
        let bus = Bus::new(0);
        bus.publish(Event::new("s", "before"));
        let mut rx = bus.subscribe();
        bus.publish(Event::new("s", "after"));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.key(), "after");
        assert_eq!(bus.receivers(), 1);
    }
}
