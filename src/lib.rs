//! # hubworker
//!
//! **hubworker** is a reverse-connecting application worker.
//!
//! Instead of listening for traffic, every worker slot dials out to a
//! load-balancing hub and answers the HTTP/1.1 requests the hub pushes down
//! that connection. When the connection breaks the slot cools down and dials
//! again, forever, until the process is told to stop.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ WorkerSlot 0 │   │ WorkerSlot 1 │   │ WorkerSlot N │
//!     │ (reconnect)  │   │ (reconnect)  │   │ (reconnect)  │
//!     └──┬────────┬──┘   └──┬────────┬──┘   └──┬────────┬──┘
//!        │ dial   │ serve   │        │         │        │
//!        ▼        ▼         ▼        ▼         ▼        ▼
//!   Connector  Handler  Connector Handler  Connector Handler
//!   (TCP +     (hyper      │        │         │        │
//!   keepalive) HTTP/1.1)   ▼        ▼         ▼        ▼
//!        │        │   ┌───────────────────────────────────────┐
//!        └────────┴──►│  hub  (HOST:PORT, pushes requests)     │
//!                     └───────────────────────────────────────┘
//!
//!   every slot ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                          ├─► LogWriter   (tracing)
//!                                                          ├─► SlotTracker (per-slot state)
//!                                                          └─► user subscribers
//! ```
//!
//! ### Lifecycle of one slot
//! ```text
//! WorkerPool ──► WorkerSlot::run()
//!
//! loop {
//!   ├─► attempt += 1, publish SlotConnecting
//!   ├─► connector.connect(hub)
//!   │       ├─ Err ──► publish ConnectFailed{ label, reason }
//!   │       │          delay = connect_backoff (2s by default)
//!   │       │
//!   │       └─ Ok  ──► publish Connected{ peer }
//!   │                  run_once(handler, conn)  (connection consumed, closed on return)
//!   │                  ├─ Ok  ─► publish SessionEnded{ requests }
//!   │                  └─ Err ─► publish SessionFailed{ label, reason }
//!   │                  delay = serve_cooldown (1s by default)
//!   │
//!   ├─► publish CooldownScheduled{ delay_ms }
//!   └─► sleep(delay) (cancellable)
//! }
//! on cancellation ─► publish SlotStopped
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Pool**          | Run N independent reconnecting slots, graceful shutdown.      | [`WorkerPool`], [`WorkerSlot`]             |
//! | **Connections**   | Dial the hub with TCP keepalive tuning.                       | [`Connector`], [`TcpConnector`], [`KeepaliveConfig`] |
//! | **Sessions**      | Serve HTTP/1.1 requests on the outbound connection.           | [`Handler`], [`HttpHandler`]               |
//! | **Applications**  | Synchronous request handlers, resolved by `module:symbol`.    | [`App`], [`AppFn`], [`AppCatalog`]         |
//! | **Policies**      | Cooldown after failed connects.                               | [`BackoffPolicy`], [`JitterPolicy`]        |
//! | **Subscriber API**| Observe slot lifecycle events.                                | [`Subscribe`], [`LogWriter`], [`SlotTracker`] |
//! | **Errors**        | Retryable connect/session errors, fatal startup errors.       | [`ConnectError`], [`SessionError`], [`StartupError`] |
//!
//! ## Example
//! ```no_run
//! use hubworker::{AppCatalog, PoolConfig, WorkerPool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = PoolConfig::default();
//!     cfg.hub = "hub.internal:4040".parse()?;
//!     cfg.workers = 8;
//!
//!     let app = AppCatalog::builtin().resolve("demo:echo")?;
//!     WorkerPool::new(cfg)?.run(app).await?;
//!     Ok(())
//! }
//! ```
mod app;
mod config;
mod core;
mod error;
mod events;
mod hub;
mod net;
mod policies;
mod session;
mod subscribers;

pub mod logging;

// ---- Public re-exports ----

pub use app::{App, AppCatalog, AppFn, AppRef, AppResponse, DEFAULT_APP, Environ};
pub use config::{DEFAULT_MAX_REQUEST_BODY, DEFAULT_SERVE_COOLDOWN, PoolConfig};
pub use core::{SlotState, WorkerParams, WorkerPool, WorkerSlot};
pub use error::{AppError, ConnectError, RuntimeError, SessionError, StartupError};
pub use events::{Bus, CooldownSource, Event, EventKind};
pub use hub::{DEFAULT_HUB, HubAddress};
pub use net::{Connection, Connector, KeepaliveConfig, Link, TcpConnector};
pub use policies::{BackoffPolicy, DEFAULT_CONNECT_COOLDOWN, JitterPolicy};
pub use session::{Handler, HttpHandler, SessionContext, SessionSummary};
pub use subscribers::{LogWriter, SlotStats, SlotTracker, Subscribe, SubscriberSet};
