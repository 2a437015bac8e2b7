//! # Event bus for runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Every slot
//! publishes into it; the pool runs one listener that fans events out to the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//! Publishers (many):                 Listener (one):
//!   Slot 0 ──┐
//!   Slot 1 ──┼──────► Bus ───────► pool listener ────► SubscriberSet
//!   Slot N ──┤  (broadcast chan)
//!   Pool   ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks a slot.
//! - Bounded ring buffer; lagging receivers skip the oldest events.
//! - Events published with no receiver are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with the given capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
