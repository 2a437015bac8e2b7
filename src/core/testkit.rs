//! Scripted connector and handlers for driving slots and pools without a hub.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::app::{AppFn, AppRef, AppResponse, Environ};
use crate::error::{ConnectError, SessionError};
use crate::hub::HubAddress;
use crate::net::{Connector, Link};
use crate::session::{Handler, SessionContext, SessionSummary};

pub(crate) fn test_app() -> AppRef {
    AppFn::arc("test", |_env: &Environ| Ok(AppResponse::text("ok")))
}

/// Result of one scripted connect.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Outcome {
    Accept,
    Refuse,
    Panic,
}

/// Connection stand-in; records its id when dropped.
pub(crate) struct StubConn {
    id: u64,
    closed: Arc<Mutex<Vec<u64>>>,
}

impl Link for StubConn {
    fn peer(&self) -> Option<SocketAddr> {
        None
    }
}

impl Drop for StubConn {
    fn drop(&mut self) {
        self.closed.lock().unwrap().push(self.id);
    }
}

enum Plan {
    Script {
        queue: Mutex<VecDeque<Outcome>>,
        then: Outcome,
    },
    FailSlots(Vec<usize>),
}

pub(crate) struct StubConnector {
    plan: Plan,
    attempts: Mutex<Vec<(usize, Instant)>>,
    next_id: AtomicU64,
    closed: Arc<Mutex<Vec<u64>>>,
}

impl StubConnector {
    fn with_plan(plan: Plan) -> Self {
        Self {
            plan,
            attempts: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Plays `script` in order (shared by all slots), then `then` forever.
    pub(crate) fn scripted(script: Vec<Outcome>, then: Outcome) -> Self {
        Self::with_plan(Plan::Script {
            queue: Mutex::new(script.into()),
            then,
        })
    }

    /// Refuses every connect from `slots`, accepts the rest.
    pub(crate) fn failing_slots(slots: Vec<usize>) -> Self {
        Self::with_plan(Plan::FailSlots(slots))
    }

    /// Times of every connect attempt, all slots.
    pub(crate) fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub(crate) fn attempts_for(&self, slot: usize) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == slot)
            .count()
    }

    /// Ids of dropped connections, in drop order.
    pub(crate) fn closed(&self) -> Vec<u64> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for StubConnector {
    type Conn = StubConn;

    async fn connect(&self, hub: &HubAddress, slot: usize) -> Result<StubConn, ConnectError> {
        self.attempts.lock().unwrap().push((slot, Instant::now()));

        let outcome = match &self.plan {
            Plan::Script { queue, then } => queue.lock().unwrap().pop_front().unwrap_or(*then),
            Plan::FailSlots(slots) if slots.contains(&slot) => Outcome::Refuse,
            Plan::FailSlots(_) => Outcome::Accept,
        };

        match outcome {
            Outcome::Accept => Ok(StubConn {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                closed: Arc::clone(&self.closed),
            }),
            Outcome::Refuse => Err(ConnectError::Connect {
                target: hub.to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
            Outcome::Panic => panic!("connector blew up"),
        }
    }
}

/// How a [`StubHandler`] session behaves.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Behavior {
    /// Serve until cancelled, then end cleanly.
    Pend,
    /// End cleanly after one request.
    Finish,
    /// End with a protocol error.
    Fail,
    /// Panic.
    Panic,
    /// Never return, ignoring cancellation.
    Stuck,
}

pub(crate) struct StubHandler {
    behavior: Behavior,
    served: AtomicUsize,
    seen: Mutex<Vec<u64>>,
    notify: Notify,
}

impl StubHandler {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            served: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    pub(crate) fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    /// Notified once per session start.
    pub(crate) fn served_notify(&self) -> &Notify {
        &self.notify
    }

    /// Ids of the connections handed to this handler, in order.
    pub(crate) fn seen(&self) -> Vec<u64> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler<StubConn> for StubHandler {
    async fn serve(
        &self,
        conn: StubConn,
        _ctx: &SessionContext,
        token: CancellationToken,
    ) -> Result<SessionSummary, SessionError> {
        self.served.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(conn.id);
        self.notify.notify_one();

        match self.behavior {
            Behavior::Pend => {
                token.cancelled().await;
                Ok(SessionSummary::default())
            }
            Behavior::Finish => Ok(SessionSummary { requests: 1 }),
            Behavior::Fail => Err(SessionError::Protocol {
                reason: "stub failure".into(),
            }),
            Behavior::Panic => panic!("handler blew up"),
            Behavior::Stuck => {
                std::future::pending::<Result<SessionSummary, SessionError>>().await
            }
        }
    }
}
