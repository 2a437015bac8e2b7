//! # LogWriter: runtime events to `tracing`
//!
//! Translates every [`Event`] into a structured `tracing` record. Levels follow
//! how much an operator should care:
//!
//! | event                              | level  |
//! |------------------------------------|--------|
//! | connecting, connect failed, cooldown | debug |
//! | connected, session ended, shutdown   | info  |
//! | session failed, subscriber overflow  | warn  |
//! | grace exceeded, subscriber panicked  | error |
//! | connect or session panicked          | error |
//!
//! A hub that is down therefore shows up as a quiet stream of debug records,
//! never as a crash. A panic is a defect in the worker, not in the hub, so it
//! is always visible at the default level.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event subscriber that writes through `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::SlotConnecting => {
                debug!(slot = e.slot, attempt = e.attempt, "connecting to hub");
            }
            EventKind::Connected => {
                info!(slot = e.slot, attempt = e.attempt, peer = e.peer.as_deref(), "connected to hub");
            }
            EventKind::ConnectFailed if is_panic(e) => {
                error!(slot = e.slot, attempt = e.attempt, label = e.label, error = reason, "connector panicked");
            }
            EventKind::ConnectFailed => {
                debug!(slot = e.slot, attempt = e.attempt, label = e.label, error = reason, "connect failed");
            }
            EventKind::SessionEnded => {
                info!(slot = e.slot, requests = e.requests, "session ended");
            }
            EventKind::SessionFailed if is_panic(e) => {
                error!(slot = e.slot, label = e.label, error = reason, "session handler panicked");
            }
            EventKind::SessionFailed => {
                warn!(slot = e.slot, label = e.label, error = reason, "session failed");
            }
            EventKind::CooldownScheduled => {
                debug!(slot = e.slot, delay_ms = e.delay_ms, after = ?e.cooldown, "cooling down");
            }
            EventKind::SlotStopped => {
                debug!(slot = e.slot, "slot stopped");
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!("all slots stopped within grace");
            }
            EventKind::GraceExceeded => {
                error!(detail = reason, "shutdown grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(detail = reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(detail = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

fn is_panic(e: &Event) -> bool {
    matches!(e.label, Some("connect_panicked" | "session_panicked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Feeds `events` to a `LogWriter` under an INFO subscriber, returns the output.
    async fn log_at_info(events: Vec<Event>) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let log = LogWriter::new();
        for ev in &events {
            log.on_event(ev).await;
        }
        captured.text()
    }

    #[tokio::test]
    async fn test_panics_are_visible_at_info() {
        let out = log_at_info(vec![
            Event::new(EventKind::ConnectFailed)
                .with_slot(0)
                .with_label("connect_panicked")
                .with_reason("connector blew up"),
            Event::new(EventKind::SessionFailed)
                .with_slot(1)
                .with_label("session_panicked")
                .with_reason("handler blew up"),
        ])
        .await;

        assert!(out.contains("connector panicked"), "{out}");
        assert!(out.contains("connector blew up"), "{out}");
        assert!(out.contains("session handler panicked"), "{out}");
        assert!(out.contains("ERROR"), "{out}");
    }

    #[tokio::test]
    async fn test_refused_connects_stay_below_info() {
        let out = log_at_info(vec![
            Event::new(EventKind::SlotConnecting).with_slot(0),
            Event::new(EventKind::ConnectFailed)
                .with_slot(0)
                .with_label("connect_refused")
                .with_reason("connection refused"),
        ])
        .await;

        assert!(out.is_empty(), "{out}");
    }
}
