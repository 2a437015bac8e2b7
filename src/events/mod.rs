//! Runtime events: types and broadcast bus.
//!
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! Publishers are the worker slots and the pool; the pool's listener is the
//! only consumer and fans out to the subscriber set.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{CooldownSource, Event, EventKind};
