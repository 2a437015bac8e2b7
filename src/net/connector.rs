//! # Hub connection factory.
//!
//! [`Connector`] is the seam the worker loop dials through; [`TcpConnector`]
//! is the production implementation.
//!
//! ```text
//! connect(hub)
//!   ├─► lookup_host(host, port)          (Resolve / NoAddresses)
//!   ├─► TcpStream::connect(addr) for each resolved addr, first success wins
//!   │     └─ all bounded by connect_timeout          (Connect / Timeout)
//!   ├─► TCP_NODELAY
//!   └─► keepalive idle / interval / probes           (SocketOption)
//! ```
//!
//! Every failure is a [`ConnectError`]; the caller cools down and retries.
//! The returned [`Connection`] owns the socket; dropping it closes it.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpStream, lookup_host};
use tokio::time;

use crate::error::ConnectError;
use crate::hub::HubAddress;
use crate::net::KeepaliveConfig;

/// Something a connector hands to a session: an open link to the hub.
pub trait Link: Send + 'static {
    /// Remote address, when known.
    fn peer(&self) -> Option<SocketAddr>;
}

/// Dials the hub.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced on success.
    type Conn: Link;

    /// Opens one connection to `hub` on behalf of worker slot `slot`.
    async fn connect(&self, hub: &HubAddress, slot: usize) -> Result<Self::Conn, ConnectError>;
}

/// Established TCP connection to the hub.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    local: SocketAddr,
}

impl Connection {
    /// Wraps a connected stream.
    pub fn new(stream: TcpStream) -> std::io::Result<Self> {
        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?;
        Ok(Self {
            stream,
            peer,
            local,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Borrow the underlying stream (socket option inspection, tests).
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

impl Link for Connection {
    fn peer(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}

/// Production connector: TCP with keepalive tuning.
#[derive(Clone, Debug, Default)]
pub struct TcpConnector {
    keepalive: KeepaliveConfig,
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(keepalive: KeepaliveConfig, connect_timeout: Option<Duration>) -> Self {
        Self {
            keepalive,
            connect_timeout,
        }
    }

    async fn dial(&self, hub: &HubAddress) -> Result<TcpStream, ConnectError> {
        let addrs: Vec<SocketAddr> = lookup_host(hub.lookup_target())
            .await
            .map_err(|source| ConnectError::Resolve {
                host: hub.host().to_string(),
                source,
            })?
            .collect();

        let mut last = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(source) => last = Some((addr, source)),
            }
        }

        Err(match last {
            Some((addr, source)) => ConnectError::Connect {
                target: addr.to_string(),
                source,
            },
            None => ConnectError::NoAddresses {
                host: hub.host().to_string(),
            },
        })
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Conn = Connection;

    async fn connect(&self, hub: &HubAddress, slot: usize) -> Result<Connection, ConnectError> {
        tracing::trace!(slot, hub = %hub, "dialing hub");
        let stream = match self.connect_timeout.filter(|d| !d.is_zero()) {
            Some(timeout) => time::timeout(timeout, self.dial(hub))
                .await
                .map_err(|_elapsed| ConnectError::Timeout {
                    target: hub.to_string(),
                    timeout,
                })??,
            None => self.dial(hub).await?,
        };

        let option_err = |option| {
            let target = hub.to_string();
            move |source| ConnectError::SocketOption {
                option,
                target,
                source,
            }
        };
        stream.set_nodelay(true).map_err(option_err("TCP_NODELAY"))?;
        self.keepalive
            .apply(&stream)
            .map_err(option_err("SO_KEEPALIVE"))?;

        let conn = Connection::new(stream).map_err(|source| ConnectError::Connect {
            target: hub.to_string(),
            source,
        })?;
        tracing::trace!(slot, peer = %conn.peer_addr(), local = %conn.local_addr(), "hub connection ready");
        Ok(conn)
    }
}
