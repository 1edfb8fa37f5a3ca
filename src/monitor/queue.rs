//! Debounced pending-event queue
//!
//! One lock guards both the queued events and the debounce generation.
//! Every push bumps the generation and hands the new value to the timer
//! scheduled for it; a timer that fires with a stale generation does
//! nothing. Draining bumps the generation too, so a manual flush also
//! invalidates every outstanding timer.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::types::BitcoinOutput;

/// A decoded notify awaiting batch validation
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub miner_id: String,
    pub outputs: Vec<BitcoinOutput>,
    pub raw_text: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct QueueState {
    events: Vec<PendingEvent>,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct PendingQueue {
    state: Mutex<QueueState>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event; returns the generation the caller's timer must hold.
    pub fn push(&self, event: PendingEvent) -> u64 {
        let mut state = self.state.lock();
        state.events.push(event);
        state.generation += 1;
        state.generation
    }

    /// Drain the queue if `generation` is still the latest. Superseded or
    /// empty drains return None.
    pub fn take_if_current(&self, generation: u64) -> Option<Vec<PendingEvent>> {
        let mut state = self.state.lock();
        if state.generation != generation || state.events.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut state.events))
    }

    /// Unconditional drain; invalidates all scheduled timers.
    pub fn drain(&self) -> Vec<PendingEvent> {
        let mut state = self.state.lock();
        state.generation += 1;
        std::mem::take(&mut state.events)
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
