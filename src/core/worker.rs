//! # WorkerSlot: one reconnecting hub worker.
//!
//! A slot owns at most one connection at a time and cycles forever:
//! - dial the hub through its [`Connector`],
//! - hand the connection to its [`Handler`] until the session ends,
//! - cool down, then dial again.
//!
//! ## Event flow
//! ```text
//! SlotConnecting → ConnectFailed → CooldownScheduled(connect_backoff) → SlotConnecting ...
//!                → Connected → SessionEnded/SessionFailed → CooldownScheduled(serve_cooldown) → ...
//!
//! On cancellation (any state) → SlotStopped
//! ```
//!
//! ## Architecture
//! ```text
//! WorkerPool ──► WorkerSlot::run(token)
//!
//! loop {
//!   ├─► CONNECTING: publish SlotConnecting, connector.connect(hub)
//!   │      ├─ Err / panic ─► publish ConnectFailed, delay = backoff(failures)
//!   │      └─ Ok(conn)    ─► publish Connected
//!   │                        SERVING: run_once(handler, conn) ─► SessionEnded/SessionFailed
//!   │                        delay = serve_cooldown
//!   └─► COOLDOWN: publish CooldownScheduled, sleep(delay)
//! }
//! ```
//!
//! ## Rules
//! - Never more than one live connection per slot; the connection is
//!   consumed by the session and closed before the cooldown starts
//! - Connect and session errors never leave the loop
//! - The attempt counter is a lifetime counter; the failure counter resets on connect
//! - Cancellation is observed while connecting, after a session and while cooling down

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::{
    app::AppRef,
    core::runner::run_once,
    error::{ConnectError, panic_message},
    events::{Bus, CooldownSource, Event, EventKind},
    hub::HubAddress,
    net::{Connector, Link},
    policies::BackoffPolicy,
    session::{Handler, SessionContext},
};

/// What a slot is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Dialing the hub.
    Connecting,
    /// Serving requests on a live connection.
    Serving,
    /// Waiting before the next connect.
    Cooldown,
    /// Left its loop.
    Stopped,
}

/// Timing parameters of a slot, extracted from [`PoolConfig`](crate::PoolConfig).
#[derive(Clone, Debug)]
pub struct WorkerParams {
    /// Cooldown after a failed connect.
    pub connect_backoff: BackoffPolicy,
    /// Cooldown after every session.
    pub serve_cooldown: Duration,
    /// Optional session deadline (`None` = no deadline).
    pub session_timeout: Option<Duration>,
}

/// One reconnecting worker.
pub struct WorkerSlot<C, H> {
    index: usize,
    connector: Arc<C>,
    handler: Arc<H>,
    ctx: SessionContext,
    params: WorkerParams,
    bus: Bus,
}

impl<C, H> WorkerSlot<C, H>
where
    C: Connector,
    H: Handler<C::Conn>,
{
    /// Creates slot `index`, serving `app` on connections to `hub`.
    pub fn new(
        index: usize,
        hub: HubAddress,
        app: AppRef,
        connector: Arc<C>,
        handler: Arc<H>,
        params: WorkerParams,
        bus: Bus,
    ) -> Self {
        Self {
            index,
            connector,
            handler,
            ctx: SessionContext {
                hub,
                slot: index,
                app,
            },
            params,
            bus,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Runs the slot until `token` is cancelled.
    ///
    /// ### Cooldowns
    /// - after a failed connect: `connect_backoff.delay_for(consecutive_failures)`
    /// - after a session, clean or not: `serve_cooldown`
    ///
    /// ### Cancellation semantics
    /// - a pending connect is dropped
    /// - a session receives a child token and is expected to drain and return
    /// - a cooldown sleep is aborted
    ///
    /// Always publishes `SlotStopped` last.
    pub async fn run(self, token: CancellationToken) {
        let mut attempt: u64 = 0;
        let mut failures: u32 = 0;

        loop {
            if token.is_cancelled() {
                break;
            }

            attempt += 1;
            self.publish(Event::new(EventKind::SlotConnecting).with_attempt(attempt));

            let connect =
                AssertUnwindSafe(self.connector.connect(&self.ctx.hub, self.index)).catch_unwind();
            let connected = select! {
                res = connect => res.unwrap_or_else(|payload| {
                    Err(ConnectError::Panicked { info: panic_message(payload.as_ref()) })
                }),
                _ = token.cancelled() => { break; }
            };

            let (delay, source) = match connected {
                Err(err) => {
                    failures = failures.saturating_add(1);
                    self.publish(
                        Event::new(EventKind::ConnectFailed)
                            .with_attempt(attempt)
                            .with_reason(err.to_string())
                            .with_label(err.as_label()),
                    );
                    (
                        self.params.connect_backoff.delay_for(failures),
                        CooldownSource::ConnectFailed,
                    )
                }
                Ok(conn) => {
                    failures = 0;
                    let mut ev = Event::new(EventKind::Connected).with_attempt(attempt);
                    if let Some(peer) = conn.peer() {
                        ev = ev.with_peer(peer.to_string());
                    }
                    self.publish(ev);

                    let _ = run_once(
                        self.handler.as_ref(),
                        conn,
                        &self.ctx,
                        self.params.session_timeout,
                        &token,
                        attempt,
                        &self.bus,
                    )
                    .await;
                    (self.params.serve_cooldown, CooldownSource::SessionEnded)
                }
            };

            if token.is_cancelled() {
                break;
            }

            self.publish(
                Event::new(EventKind::CooldownScheduled)
                    .with_attempt(attempt)
                    .with_cooldown(delay, source),
            );

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = token.cancelled() => { break; }
            }
        }

        self.publish(Event::new(EventKind::SlotStopped));
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_slot(self.index));
    }
}
