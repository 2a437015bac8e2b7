//! # Event subscribers.
//!
//! ```text
//!   WorkerSlot ── publish(Event) ──► Bus ──► SubscriberSet
//!                                              │
//!                                              ├──► LogWriter   (tracing records)
//!                                              ├──► SlotTracker (per-slot state)
//!                                              └──► user subscribers
//! ```
//!
//! - **Passive subscribers** observe and react (logging, metrics, alerts).
//! - **Stateful subscribers** keep state derived from events (SlotTracker).

mod log;
mod set;
mod subscribe;
mod tracker;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
pub use tracker::{SlotStats, SlotTracker};
