//! # Per-slot state tracker.
//!
//! Maintains what each worker slot is doing right now and a few lifetime
//! counters, built purely from bus events.
//!
//! ```text
//! WorkerSlot ──► Bus ──► pool listener ──► SubscriberSet ──► SlotTracker::on_event()
//!                                                                   │
//!                                                                   ▼
//!                                                 HashMap<usize, SlotStats>
//! ```
//!
//! ## Rules
//! - `SlotConnecting` → `Connecting`, `Connected` → `Serving`,
//!   `CooldownScheduled` → `Cooldown`, `SlotStopped` → `Stopped`
//! - Events with `seq <= last_seq` for a slot are ignored (stale)
//! - Reads are eventually consistent with the slots themselves

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::SlotState;
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Snapshot of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStats {
    /// Current state of the loop.
    pub state: SlotState,
    /// Successful connects.
    pub connects: u64,
    /// Failed connects.
    pub connect_failures: u64,
    /// Sessions that ended cleanly.
    pub sessions: u64,
    /// Sessions that ended with an error.
    pub session_failures: u64,
    last_seq: u64,
}

impl Default for SlotStats {
    fn default() -> Self {
        Self {
            state: SlotState::Connecting,
            connects: 0,
            connect_failures: 0,
            sessions: 0,
            session_failures: 0,
            last_seq: 0,
        }
    }
}

/// Subscriber that tracks slot states.
#[derive(Default)]
pub struct SlotTracker {
    slots: RwLock<HashMap<usize, SlotStats>>,
}

impl SlotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event. Returns `false` for events without a slot or stale ones.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(slot) = ev.slot else {
            return false;
        };

        let mut slots = self.slots.write().await;
        let stats = slots.entry(slot).or_default();
        if stats.last_seq != 0 && ev.seq <= stats.last_seq {
            return false;
        }
        stats.last_seq = ev.seq;

        match ev.kind {
            EventKind::SlotConnecting => stats.state = SlotState::Connecting,
            EventKind::Connected => {
                stats.state = SlotState::Serving;
                stats.connects += 1;
            }
            EventKind::ConnectFailed => stats.connect_failures += 1,
            EventKind::SessionEnded => stats.sessions += 1,
            EventKind::SessionFailed => stats.session_failures += 1,
            EventKind::CooldownScheduled => stats.state = SlotState::Cooldown,
            EventKind::SlotStopped => stats.state = SlotState::Stopped,
            _ => return false,
        }
        true
    }

    /// Returns the stats of one slot, if it ever reported.
    pub async fn get(&self, slot: usize) -> Option<SlotStats> {
        self.slots.read().await.get(&slot).cloned()
    }

    /// Returns the sorted indices of slots that have not stopped.
    pub async fn busy(&self) -> Vec<usize> {
        let slots = self.slots.read().await;
        let mut busy: Vec<usize> = slots
            .iter()
            .filter(|(_, s)| s.state != SlotState::Stopped)
            .map(|(idx, _)| *idx)
            .collect();
        busy.sort_unstable();
        busy
    }
}

#[async_trait]
impl Subscribe for SlotTracker {
    async fn on_event(&self, event: &Event) {
        self.update(event).await;
    }

    fn name(&self) -> &'static str {
        "slot-tracker"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}
