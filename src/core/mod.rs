//! Runtime core: worker slots and the pool that runs them.
//!
//! The public API from this module is [`WorkerPool`], [`WorkerSlot`] and
//! [`SlotState`].
//!
//! Internal modules:
//! - [`pool`]: spawns slots, fans out events, handles shutdown and grace;
//! - [`worker`]: the connect → serve → cooldown loop of one slot;
//! - [`runner`]: runs one session with deadline, panic containment and events;
//! - [`shutdown`]: cross-platform termination signals.

mod pool;
mod runner;
mod shutdown;
mod worker;

#[cfg(test)]
pub(crate) mod testkit;

pub use pool::WorkerPool;
pub use worker::{SlotState, WorkerParams, WorkerSlot};
