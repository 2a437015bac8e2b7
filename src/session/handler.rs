//! # Session handler seam.
//!
//! A [`Handler`] drives one protocol session over one connection. The worker
//! loop owns the connection until it hands it over here; the handler consumes
//! it, so the socket is closed when `serve` returns, whatever the outcome.
//!
//! The token passed to `serve` is cancelled when the pool shuts down. A handler
//! should finish the request in flight, stop reading new ones and return.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::app::AppRef;
use crate::error::SessionError;
use crate::hub::HubAddress;
use crate::net::Link;

/// Read-only inputs shared by every session of a slot.
#[derive(Clone)]
pub struct SessionContext {
    /// Hub the connection was dialed to (server identity for the app).
    pub hub: HubAddress,
    /// Index of the slot running the session.
    pub slot: usize,
    /// Application invoked for each request.
    pub app: AppRef,
}

/// Outcome of a session that ended cleanly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Requests answered on the connection.
    pub requests: u64,
}

/// Serves one connection to completion.
#[async_trait]
pub trait Handler<C: Link>: Send + Sync + 'static {
    /// Runs the session. Returns when the peer is done or the session broke.
    async fn serve(
        &self,
        conn: C,
        ctx: &SessionContext,
        token: CancellationToken,
    ) -> Result<SessionSummary, SessionError>;
}
