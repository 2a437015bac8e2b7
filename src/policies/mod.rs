//! Cooldown policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how long to wait after a failed connect (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization so a fleet does not reconnect in lockstep
//!
//! ## Quick wiring
//! ```text
//! PoolConfig { connect_backoff: BackoffPolicy, serve_cooldown: Duration, .. }
//!      └─► core::worker::WorkerSlot uses:
//!           - connect_backoff.delay_for(consecutive_failures) after ConnectFailed
//!           - serve_cooldown after every session
//! ```

mod backoff;
mod jitter;

pub use backoff::{BackoffPolicy, DEFAULT_CONNECT_COOLDOWN};
pub use jitter::JitterPolicy;
