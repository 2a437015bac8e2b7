//! # Run a single session on an established connection.
//!
//! Hands one connection to a [`Handler`] with an optional deadline and
//! publishes the session outcome to [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Clean end:
//!   handler.serve() → Ok(summary)  → publish SessionEnded (requests)
//!
//! Failure:
//!   handler.serve() → Err(e)       → publish SessionFailed (reason, label)
//!
//! Panic:
//!   handler.serve() panics         → publish SessionFailed (session_panicked)
//!
//! Deadline:
//!   deadline exceeded → cancel child, drop session → publish SessionFailed (session_timeout)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `SessionEnded` or `SessionFailed`
//! - The connection is moved into the session and closed when it returns or is dropped
//! - Derives a **child token** per session; cancelling it never affects the pool

use std::{panic::AssertUnwindSafe, time::Duration};

use futures::FutureExt;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{SessionError, panic_message},
    events::{Bus, Event, EventKind},
    net::Link,
    session::{Handler, SessionContext, SessionSummary},
};

/// Serves `conn` with `handler` until the session ends, publishing the outcome to `bus`.
///
/// ### Deadline behavior
/// If `timeout` is `Some(dur)` and `dur > 0` the session is dropped after `dur`,
/// which closes the connection, and `SessionError::Timeout` is returned.
///
/// ### Cancellation semantics
/// The handler receives a child of `parent`. On pool shutdown the handler is
/// expected to finish its current request and return; the grace period in
/// the pool bounds how long that may take.
pub async fn run_once<C, H>(
    handler: &H,
    conn: C,
    ctx: &SessionContext,
    timeout: Option<Duration>,
    parent: &CancellationToken,
    attempt: u64,
    bus: &Bus,
) -> Result<SessionSummary, SessionError>
where
    C: Link,
    H: Handler<C> + ?Sized,
{
    let child = parent.child_token();
    let session = AssertUnwindSafe(handler.serve(conn, ctx, child.clone())).catch_unwind();

    let caught = if let Some(dur) = timeout.filter(|d| !d.is_zero()) {
        match time::timeout(dur, session).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                Ok(Err(SessionError::Timeout { timeout: dur }))
            }
        }
    } else {
        session.await
    };

    let res = caught.unwrap_or_else(|payload| {
        Err(SessionError::Panicked {
            info: panic_message(payload.as_ref()),
        })
    });

    match &res {
        Ok(summary) => publish_ended(bus, ctx.slot, attempt, summary),
        Err(e) => publish_failed(bus, ctx.slot, attempt, e),
    }
    res
}

/// Publishes `SessionEnded` (clean end, connection closed).
fn publish_ended(bus: &Bus, slot: usize, attempt: u64, summary: &SessionSummary) {
    bus.publish(
        Event::new(EventKind::SessionEnded)
            .with_slot(slot)
            .with_attempt(attempt)
            .with_requests(summary.requests),
    );
}

/// Publishes `SessionFailed` with error details.
fn publish_failed(bus: &Bus, slot: usize, attempt: u64, err: &SessionError) {
    bus.publish(
        Event::new(EventKind::SessionFailed)
            .with_slot(slot)
            .with_attempt(attempt)
            .with_reason(err.to_string())
            .with_label(err.as_label()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::{Behavior, Outcome, StubConnector, StubHandler, test_app};
    use crate::hub::HubAddress;
    use crate::net::Connector;

    fn ctx() -> SessionContext {
        SessionContext {
            hub: HubAddress::default(),
            slot: 5,
            app: test_app(),
        }
    }

    async fn conn(connector: &StubConnector) -> <StubConnector as Connector>::Conn {
        connector.connect(&HubAddress::default(), 5).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_drops_session_and_closes_connection() {
        let connector = StubConnector::scripted(vec![], Outcome::Accept);
        let handler = StubHandler::new(Behavior::Stuck);
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        let res = run_once(
            &handler,
            conn(&connector).await,
            &ctx(),
            Some(Duration::from_secs(3)),
            &CancellationToken::new(),
            1,
            &bus,
        )
        .await;

        assert!(matches!(res, Err(SessionError::Timeout { .. })));
        assert_eq!(connector.closed().len(), 1);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SessionFailed);
        assert_eq!(ev.label, Some("session_timeout"));
        assert_eq!(ev.slot, Some(5));
    }

    #[tokio::test]
    async fn test_clean_end_publishes_request_count() {
        let connector = StubConnector::scripted(vec![], Outcome::Accept);
        let handler = StubHandler::new(Behavior::Finish);
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        let summary = run_once(
            &handler,
            conn(&connector).await,
            &ctx(),
            None,
            &CancellationToken::new(),
            2,
            &bus,
        )
        .await
        .unwrap();

        assert_eq!(summary.requests, 1);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SessionEnded);
        assert_eq!(ev.requests, Some(1));
        assert_eq!(ev.attempt, Some(2));
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_session_error() {
        let connector = StubConnector::scripted(vec![], Outcome::Accept);
        let handler = StubHandler::new(Behavior::Panic);
        let bus = Bus::new(8);

        let err = run_once(
            &handler,
            conn(&connector).await,
            &ctx(),
            None,
            &CancellationToken::new(),
            1,
            &bus,
        )
        .await
        .unwrap_err();

        assert_eq!(err.as_label(), "session_panicked");
        assert!(err.to_string().contains("handler blew up"));
        assert_eq!(connector.closed().len(), 1);
    }
}
