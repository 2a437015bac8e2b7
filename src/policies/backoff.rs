//! # Cooldown policy for reconnect attempts.
//!
//! [`BackoffPolicy`] decides how long a slot waits after a failed connect
//! before dialing the hub again. The default is a constant 2s pause, which is
//! enough to keep a fleet from hammering a hub that is down. Setting
//! `factor > 1.0` turns it into capped exponential backoff.
//!
//! The delay after the `n`-th consecutive failure (1-based) is
//! `first × factor^(n-1)`, clamped to `max`, then jittered. The base is derived
//! from the failure count alone, so jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use hubworker::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(8),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(500));
//! assert_eq!(backoff.delay_for(3), Duration::from_secs(2));
//! assert_eq!(backoff.delay_for(30), Duration::from_secs(8));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Default pause after a failed connect.
pub const DEFAULT_CONNECT_COOLDOWN: Duration = Duration::from_secs(2);

/// Reconnect cooldown policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Upper bound for the computed delay.
    pub max: Duration,
    /// Growth per consecutive failure (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 2s, no jitter.
    fn default() -> Self {
        Self::constant(DEFAULT_CONNECT_COOLDOWN)
    }
}

impl BackoffPolicy {
    /// Same delay after every failure.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns a copy with the given jitter.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the cooldown after `failures` consecutive connect failures.
    ///
    /// `failures = 0` is treated as `1`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        self.jitter.apply(base, self.first.min(self.max), self.max)
    }

    /// Checks that the policy can produce sensible delays.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(format!("backoff factor must be >= 1.0, got {}", self.factor));
        }
        if self.max < self.first {
            return Err(format!(
                "backoff max {:?} is smaller than first {:?}",
                self.max, self.first
            ));
        }
        if self.factor > 1.0 && self.max <= self.first {
            return Err(format!(
                "backoff factor {} cannot grow past max {:?}; raise max above first",
                self.factor, self.max
            ));
        }
        Ok(())
    }
}
