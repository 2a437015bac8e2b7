//! # TCP keepalive settings.
//!
//! The hub connection can sit idle for long stretches between requests. Rather
//! than an application-level heartbeat, the kernel probes the peer: after
//! `idle` without traffic it sends up to `probes` probes `interval` apart, and
//! a hub that answers none of them is declared dead. With the defaults the
//! worst case is `1s + 2s × 3 = 7s`.

use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

/// Keepalive tuning applied to every hub connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Idle time before the first probe.
    pub idle: Duration,
    /// Time between probes.
    pub interval: Duration,
    /// Unanswered probes before the connection is dropped.
    pub probes: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(1),
            interval: Duration::from_secs(2),
            probes: 3,
        }
    }
}

impl KeepaliveConfig {
    /// Upper bound on how long a dead hub goes unnoticed.
    pub fn detection_bound(&self) -> Duration {
        self.idle + self.interval * self.probes
    }

    /// Enables keepalive on `stream` with these settings.
    pub(crate) fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        let params = TcpKeepalive::new().with_time(self.idle);
        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "netbsd",
        ))]
        let params = params
            .with_interval(self.interval)
            .with_retries(self.probes);

        SockRef::from(stream).set_tcp_keepalive(&params)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let second = Duration::from_secs(1);
        if self.idle < second || self.interval < second {
            return Err("keepalive idle and interval must be at least 1s".to_string());
        }
        if self.probes == 0 {
            return Err("keepalive probe count must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_detection_bound() {
        assert_eq!(KeepaliveConfig::default().detection_bound(), Duration::from_secs(7));
    }

    #[test]
    fn test_validate() {
        assert!(KeepaliveConfig::default().validate().is_ok());
        let bad = KeepaliveConfig {
            probes: 0,
            ..KeepaliveConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
