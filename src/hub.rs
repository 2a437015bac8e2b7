//! # Hub address.
//!
//! [`HubAddress`] is the `(host, port)` pair of the upstream load-balancing hub.
//! It is parsed once at startup and never changes; resolution to socket
//! addresses happens on every connect so a hub that moves in DNS is followed.
//!
//! Accepted forms:
//! - `host:port` (`localhost:4040`, `10.0.0.7:4040`)
//! - `[v6]:port` (`[::1]:4040`)

use std::fmt;
use std::str::FromStr;

use crate::error::StartupError;

/// Default hub address used by the CLI.
pub const DEFAULT_HUB: &str = "localhost:4040";

/// Immutable `(host, port)` of the hub.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HubAddress {
    host: String,
    port: u16,
}

impl HubAddress {
    /// Creates an address from parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal (without IPv6 brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the `(host, port)` pair accepted by `tokio::net::lookup_host`.
    pub(crate) fn lookup_target(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl FromStr for HubAddress {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| StartupError::InvalidAddress {
            input: s.to_string(),
            reason,
        };

        let s = s.trim();
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 bracket"))?;
            let port = tail
                .strip_prefix(':')
                .ok_or_else(|| invalid("missing port"))?;
            (host, port)
        } else {
            let (host, port) = s.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
            if host.contains(':') {
                return Err(invalid("IPv6 hosts must be bracketed"));
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port: u16 = port.parse().map_err(|_| invalid("port is not a number"))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for HubAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Default for HubAddress {
    fn default() -> Self {
        Self::new("localhost", 4040)
    }
}
