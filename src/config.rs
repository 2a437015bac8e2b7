//! # Pool configuration.
//!
//! Provides [`PoolConfig`] centralized settings for the [`WorkerPool`](crate::WorkerPool).
//!
//! ## Sentinel values
//! - `connect_timeout = 0s` → no connect deadline (the OS decides)
//! - `session_timeout = 0s` → sessions run until the hub closes them
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use hubworker::{BackoffPolicy, PoolConfig};
//!
//! let mut cfg = PoolConfig::default();
//! cfg.workers = 4;
//! cfg.hub = "hub.internal:4040".parse()?;
//! cfg.connect_backoff = BackoffPolicy::constant(Duration::from_secs(2));
//!
//! assert!(cfg.validate().is_ok());
//! assert_eq!(cfg.session_deadline(), None);
//! # Ok::<(), hubworker::StartupError>(())
//! ```

use std::time::Duration;

use crate::error::StartupError;
use crate::hub::HubAddress;
use crate::net::KeepaliveConfig;
use crate::policies::BackoffPolicy;

/// Cooldown after every session, successful or not.
pub const DEFAULT_SERVE_COOLDOWN: Duration = Duration::from_secs(1);

/// Largest request body buffered for the app (16 MiB).
pub const DEFAULT_MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

/// Configuration for a worker pool.
///
/// ## Field semantics
/// - `hub`: where every slot dials
/// - `workers`: number of independent slots (at least 1; each slot is one task and one socket)
/// - `keepalive`: TCP keepalive applied to every connection
/// - `connect_timeout`: deadline for one connect attempt (`0s` = none)
/// - `connect_backoff`: cooldown after a failed connect
/// - `serve_cooldown`: cooldown after a session
/// - `session_timeout`: deadline for one session (`0s` = none)
/// - `grace`: how long shutdown waits for slots to stop
/// - `max_request_body`: larger request bodies are answered with 413
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Hub address.
    pub hub: HubAddress,
    /// Number of worker slots.
    pub workers: usize,
    /// TCP keepalive parameters.
    pub keepalive: KeepaliveConfig,
    /// Connect attempt deadline (`Duration::ZERO` = none).
    pub connect_timeout: Duration,
    /// Cooldown after a failed connect.
    pub connect_backoff: BackoffPolicy,
    /// Cooldown after a session ends.
    pub serve_cooldown: Duration,
    /// Session deadline (`Duration::ZERO` = none).
    pub session_timeout: Duration,
    /// Maximum time to wait for graceful shutdown.
    ///
    /// On shutdown every slot is cancelled; the pool then waits up to `grace`
    /// and returns `RuntimeError::GraceExceeded` if some slot is still running.
    pub grace: Duration,
    /// Request body limit in bytes.
    pub max_request_body: usize,
    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl PoolConfig {
    /// Returns the connect deadline as an `Option`.
    #[inline]
    pub fn connect_deadline(&self) -> Option<Duration> {
        (!self.connect_timeout.is_zero()).then_some(self.connect_timeout)
    }

    /// Returns the session deadline as an `Option`.
    #[inline]
    pub fn session_deadline(&self) -> Option<Duration> {
        (!self.session_timeout.is_zero()).then_some(self.session_timeout)
    }

    /// Checks the configuration before any slot starts.
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.workers == 0 {
            return Err(StartupError::InvalidWorkerCount {
                count: self.workers,
            });
        }
        self.keepalive
            .validate()
            .map_err(|reason| StartupError::InvalidConfig { reason })?;
        self.connect_backoff
            .validate()
            .map_err(|reason| StartupError::InvalidConfig { reason })?;
        Ok(())
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `hub = localhost:4040`
    /// - `workers = 1`
    /// - `keepalive = 1s idle / 2s interval / 3 probes`
    /// - `connect_timeout = 10s`
    /// - `connect_backoff = constant 2s`
    /// - `serve_cooldown = 1s`
    /// - `session_timeout = 0s` (none)
    /// - `grace = 5s`
    /// - `max_request_body = 16 MiB`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            hub: HubAddress::default(),
            workers: 1,
            keepalive: KeepaliveConfig::default(),
            connect_timeout: Duration::from_secs(10),
            connect_backoff: BackoffPolicy::default(),
            serve_cooldown: DEFAULT_SERVE_COOLDOWN,
            session_timeout: Duration::ZERO,
            grace: Duration::from_secs(5),
            max_request_body: DEFAULT_MAX_REQUEST_BODY,
            bus_capacity: 1024,
        }
    }
}
