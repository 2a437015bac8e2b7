//! # Subscriber trait
//!
//! `Subscribe` is the extension point for plugging event handlers into the
//! pool. Each subscriber is driven by its own worker task fed by a bounded
//! queue owned by the [`SubscriberSet`](crate::SubscriberSet), so a slow
//! subscriber never stalls a worker slot.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use hubworker::{Event, EventKind, Subscribe};
//!
//! struct CountReconnects(std::sync::atomic::AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for CountReconnects {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::SlotConnecting {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "count-reconnects" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue. Events beyond it are dropped.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
