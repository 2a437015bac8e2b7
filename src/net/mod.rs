//! Outbound connections to the hub.
//!
//! - [`Connector`] / [`TcpConnector`] open one connection per call
//! - [`Connection`] owns the socket for the duration of one session
//! - [`KeepaliveConfig`] dead-peer detection without application heartbeats

mod connector;
mod keepalive;

pub use connector::{Connection, Connector, Link, TcpConnector};
pub use keepalive::KeepaliveConfig;
