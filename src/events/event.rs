//! # Runtime events emitted by the pool and its worker slots.
//!
//! [`EventKind`] classifies what happened:
//! - **Slot lifecycle**: connecting, connected, connect failed, session ended/failed,
//!   cooldown scheduled, slot stopped
//! - **Shutdown**: requested, completed within grace, grace exceeded
//! - **Subscriber health**: overflow, panic
//!
//! [`Event`] carries the metadata: slot index, attempt counter, peer, reason,
//! cooldown delay and request count, depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use hubworker::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ConnectFailed)
//!     .with_slot(2)
//!     .with_attempt(7)
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::ConnectFailed);
//! assert_eq!(ev.slot, Some(2));
//! assert_eq!(ev.reason.as_deref(), Some("connection refused"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Slot lifecycle ===
    /// Slot entered `Connecting` and is dialing the hub.
    ///
    /// Sets `slot`, `attempt` (lifetime connect attempts of the slot, 1-based).
    SlotConnecting,

    /// Connect succeeded; slot entered `Serving`.
    ///
    /// Sets `slot`, `attempt`, `peer`.
    Connected,

    /// Connect failed (retryable).
    ///
    /// Sets `slot`, `attempt`, `reason`, `label`.
    ConnectFailed,

    /// Session ended cleanly and the connection was closed.
    ///
    /// Sets `slot`, `attempt`, `requests`.
    SessionEnded,

    /// Session ended with an error and the connection was closed.
    ///
    /// Sets `slot`, `attempt`, `reason`, `label`.
    SessionFailed,

    /// Slot entered `Cooldown`.
    ///
    /// Sets `slot`, `attempt`, `delay_ms`, `cooldown`.
    CooldownScheduled,

    /// Slot left its loop because the pool is shutting down.
    ///
    /// Sets `slot`.
    SlotStopped,

    // === Shutdown ===
    /// Shutdown requested (OS signal or caller-provided future).
    ShutdownRequested,

    /// All slots stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some slots were still busy.
    GraceExceeded,

    // === Subscriber health ===
    /// Subscriber panicked while handling an event.
    ///
    /// Sets `reason` (subscriber name and panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event because its queue was full or closed.
    ///
    /// Sets `reason`.
    SubscriberOverflow,
}

/// What the cooldown follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownSource {
    /// A failed connect.
    ConnectFailed,
    /// A session that ended (successfully or not).
    SessionEnded,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Index of the slot that produced the event.
    pub slot: Option<usize>,
    /// Lifetime connect attempt counter of the slot.
    pub attempt: Option<u64>,
    /// Remote address of the hub connection.
    pub peer: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details).
    pub reason: Option<Arc<str>>,
    /// Stable error label (see `as_label` on the error types).
    pub label: Option<&'static str>,
    /// Cooldown before the next connect, in milliseconds.
    pub delay_ms: Option<u32>,
    /// What the cooldown follows.
    pub cooldown: Option<CooldownSource>,
    /// Requests served during the session.
    pub requests: Option<u64>,
}

impl Event {
    /// Creates an event of the given kind stamped with the current time and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            slot: None,
            attempt: None,
            peer: None,
            reason: None,
            label: None,
            delay_ms: None,
            cooldown: None,
            requests: None,
        }
    }

    #[inline]
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, attempt: u64) -> Self {
        self.attempt = Some(attempt);
        self
    }

    #[inline]
    pub fn with_peer(mut self, peer: impl Into<Arc<str>>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Attaches a cooldown delay (stored as milliseconds) and what it follows.
    #[inline]
    pub fn with_cooldown(mut self, delay: Duration, source: CooldownSource) -> Self {
        self.delay_ms = Some(delay.as_millis().min(u128::from(u32::MAX)) as u32);
        self.cooldown = Some(source);
        self
    }

    #[inline]
    pub fn with_requests(mut self, requests: u64) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// True for events produced by the subscriber machinery itself.
    #[inline]
    pub fn is_subscriber_health(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::SlotConnecting);
        let b = Event::new(EventKind::SlotConnecting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_cooldown_is_stored_in_millis() {
        let ev = Event::new(EventKind::CooldownScheduled)
            .with_cooldown(Duration::from_millis(1500), CooldownSource::SessionEnded);
        assert_eq!(ev.delay_ms, Some(1500));
        assert_eq!(ev.cooldown, Some(CooldownSource::SessionEnded));
    }

    #[test]
    fn test_subscriber_health_helpers() {
        let ev = Event::subscriber_overflow("log", "full");
        assert!(ev.is_subscriber_health());
        assert_eq!(ev.reason.as_deref(), Some("subscriber=log reason=full"));
        assert!(!Event::new(EventKind::Connected).is_subscriber_health());
    }
}
