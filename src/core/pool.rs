//! # WorkerPool: runs N worker slots, fans out events, shuts down gracefully.
//!
//! The [`WorkerPool`] owns the configuration, the shared connector and handler,
//! and the subscriber list. Each run creates an event bus, spawns one
//! [`WorkerSlot`] per configured worker and waits for a shutdown request.
//!
//! ## High-level architecture
//! ```text
//! Inputs to run_until():
//!   AppRef, shutdown future  ──►  WorkerPool::run_until(app, shutdown)
//!
//! Preparation:
//!   - Bus::new(cfg.bus_capacity)
//!   - subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)   (fire-and-forget)
//!
//! Spawn slots:
//!   slot 0   slot 1   ...   slot N-1
//!     │        │               │
//!     └──► WorkerSlot::new(index, hub, app, connector, handler, params, bus)
//!              └──► child CancellationToken = runtime_token.child_token()
//!                   set.spawn(slot.run(child_token))
//!
//! Event flow:
//!   WorkerSlot ... ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//!                                                         ┌────────┬─────────┐
//!                                                         ▼        ▼         ▼
//!                                                    LogWriter SlotTracker user subscribers
//!
//! Shutdown path:
//!   shutdown future completes (OS signal in `run`)
//!             └─► Bus.publish(ShutdownRequested)
//!             └─► runtime_token.cancel()   → propagates to every slot and session
//!             └─► wait_all_with_grace(cfg.grace):
//!                    ├─ Ok (all joined)    → Bus.publish(AllStoppedWithin)
//!                    └─ Timeout exceeded   → Bus.publish(GraceExceeded), abort the rest
//!                                            RuntimeError::GraceExceeded { busy slots }
//! ```
//!
//! Slots never end on their own: connect and session errors are retried
//! inside each slot, so only a shutdown request stops the pool.
//!
//! ## Example
//! ```no_run
//! use hubworker::{AppCatalog, PoolConfig, WorkerPool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = PoolConfig::default();
//!     cfg.workers = 4;
//!
//!     let app = AppCatalog::builtin().resolve("demo:hello")?;
//!     let pool = WorkerPool::new(cfg)?;
//!     pool.run(app).await?;
//!     Ok(())
//! }
//! ```

use std::{collections::HashMap, future::Future, sync::Arc};

use tokio::{
    sync::broadcast::error::RecvError,
    task::{self, JoinHandle, JoinSet},
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    app::AppRef,
    config::PoolConfig,
    core::{
        shutdown,
        worker::{WorkerParams, WorkerSlot},
    },
    error::{RuntimeError, StartupError},
    events::{Bus, Event, EventKind},
    net::{Connector, TcpConnector},
    session::{Handler, HttpHandler},
    subscribers::{LogWriter, SlotTracker, Subscribe, SubscriberSet},
};

/// Runs worker slots against one hub.
pub struct WorkerPool<C = TcpConnector, H = HttpHandler> {
    cfg: PoolConfig,
    connector: Arc<C>,
    handler: Arc<H>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    tracker: Arc<SlotTracker>,
}

impl WorkerPool {
    /// Creates a pool that dials over TCP and speaks HTTP/1.1.
    ///
    /// Fails with a [`StartupError`] if `cfg` does not validate.
    pub fn new(cfg: PoolConfig) -> Result<Self, StartupError> {
        let connector = TcpConnector::new(cfg.keepalive, cfg.connect_deadline());
        let handler = HttpHandler::new().with_max_body(cfg.max_request_body);
        Self::with_parts(cfg, Arc::new(connector), Arc::new(handler))
    }
}

impl<C, H> WorkerPool<C, H>
where
    C: Connector,
    H: Handler<C::Conn>,
{
    /// Creates a pool with a custom connector and handler.
    ///
    /// The pool always carries a [`LogWriter`] and a [`SlotTracker`] subscriber.
    pub fn with_parts(
        cfg: PoolConfig,
        connector: Arc<C>,
        handler: Arc<H>,
    ) -> Result<Self, StartupError> {
        cfg.validate()?;

        let tracker = Arc::new(SlotTracker::new());
        let log: Arc<dyn Subscribe> = Arc::new(LogWriter::new());
        let tracked: Arc<dyn Subscribe> = tracker.clone();

        Ok(Self {
            cfg,
            connector,
            handler,
            subscribers: vec![log, tracked],
            tracker,
        })
    }

    /// Adds a subscriber that receives every event of every run.
    #[must_use]
    pub fn with_subscriber(mut self, sub: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(sub);
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    /// Per-slot state, fed by the events of the current or last run.
    pub fn tracker(&self) -> Arc<SlotTracker> {
        Arc::clone(&self.tracker)
    }

    /// Runs until SIGINT, SIGTERM or SIGQUIT (Ctrl-C elsewhere), then shuts down.
    pub async fn run(&self, app: AppRef) -> Result<(), RuntimeError> {
        self.run_until(app, async {
            match shutdown::wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal, "termination signal received"),
                Err(err) => {
                    tracing::warn!(error = %err, "cannot install signal handlers; running until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Runs until `shutdown` completes, then cancels every slot and waits up
    /// to [`PoolConfig::grace`] for them to stop.
    pub async fn run_until<F>(&self, app: AppRef, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let bus = Bus::new(self.cfg.bus_capacity);
        let done = CancellationToken::new();
        let listener = self.subscriber_listener(&bus, done.clone());

        tracing::info!(
            hub = %self.cfg.hub,
            workers = self.cfg.workers,
            app = app.name(),
            "worker pool starting"
        );

        let token = CancellationToken::new();
        let mut set = JoinSet::new();
        let mut slots = self.spawn_slots(&mut set, &token, &bus, &app);
        let res = self
            .drive_shutdown(&mut set, &mut slots, &token, &bus, shutdown)
            .await;

        done.cancel();
        let _ = listener.await;
        res
    }

    /// Subscribes to the bus and forwards events to a fresh subscriber set.
    ///
    /// Once `done` fires, drains what is already queued and waits for the
    /// subscribers to finish.
    fn subscriber_listener(&self, bus: &Bus, done: CancellationToken) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), bus.clone());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event listener lagged; events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = done.cancelled() => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
            set.shutdown().await;
        })
    }

    /// Spawns one slot per configured worker; returns task id → slot index.
    fn spawn_slots(
        &self,
        set: &mut JoinSet<()>,
        runtime_token: &CancellationToken,
        bus: &Bus,
        app: &AppRef,
    ) -> HashMap<task::Id, usize> {
        let params = WorkerParams {
            connect_backoff: self.cfg.connect_backoff.clone(),
            serve_cooldown: self.cfg.serve_cooldown,
            session_timeout: self.cfg.session_deadline(),
        };

        (0..self.cfg.workers)
            .map(|index| {
                let slot = WorkerSlot::new(
                    index,
                    self.cfg.hub.clone(),
                    Arc::clone(app),
                    Arc::clone(&self.connector),
                    Arc::clone(&self.handler),
                    params.clone(),
                    bus.clone(),
                );
                let child = runtime_token.child_token();
                (set.spawn(slot.run(child)).id(), index)
            })
            .collect()
    }

    /// Waits until either all slots finish or `shutdown` completes.
    async fn drive_shutdown<F>(
        &self,
        set: &mut JoinSet<()>,
        slots: &mut HashMap<task::Id, usize>,
        runtime_token: &CancellationToken,
        bus: &Bus,
        shutdown: F,
    ) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                bus.publish(Event::new(EventKind::ShutdownRequested));
                runtime_token.cancel();
                self.wait_all_with_grace(set, slots, bus).await
            }
            _ = reap(set, slots) => Ok(()),
        }
    }

    /// Waits for all slots to stop within [`PoolConfig::grace`].
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout, aborts the remaining slots and
    /// returns [`RuntimeError::GraceExceeded`] with their indices.
    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<()>,
        slots: &mut HashMap<task::Id, usize>,
        bus: &Bus,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;

        match time::timeout(grace, reap(set, slots)).await {
            Ok(()) => {
                bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_elapsed) => {
                let mut busy: Vec<usize> = slots.values().copied().collect();
                busy.sort_unstable();
                bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(format!("busy slots: {busy:?}")),
                );
                set.abort_all();
                Err(RuntimeError::GraceExceeded { grace, busy })
            }
        }
    }
}

/// Joins finished slot tasks, forgetting them in `slots`.
async fn reap(set: &mut JoinSet<()>, slots: &mut HashMap<task::Id, usize>) {
    while let Some(res) = set.join_next_with_id().await {
        let id = match res {
            Ok((id, ())) => id,
            Err(err) => {
                tracing::error!(slot = ?slots.get(&err.id()), error = %err, "worker slot task ended abnormally");
                err.id()
            }
        };
        slots.remove(&id);
    }
}
