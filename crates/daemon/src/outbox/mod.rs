// Session outbox: sequenced, bounded queue of events leaving the bridge.
//
// Every event gets the next sequence number when it is pushed, so pollers
// observe events in production order:
//   push → (poll after seq) → consumer
//   push → broadcast      → in-process subscribers
//
// When the queue is full the oldest event is dropped and counted; pollers
// notice the gap through the sequence numbers.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use padsync_common::protocol::session::{SequencedEvent, SessionEvent};
use tokio::sync::broadcast;
use tracing::warn;

// ── Constants ───────────────────────────────────────────────────────

pub const DEFAULT_CAPACITY: usize = 4_096;
const BROADCAST_CAPACITY: usize = 1_024;
pub const MAX_POLL_LIMIT: usize = 1_024;

// ── Types ───────────────────────────────────────────────────────────

struct OutboxState {
    next_seq: u64,
    events: VecDeque<SequencedEvent>,
    capacity: usize,
    dropped: u64,
}

/// A page of events returned by [`SessionOutbox::poll`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OutboxPage {
    pub events: Vec<SequencedEvent>,
    /// Pass as `after` on the next poll.
    pub next: u64,
    /// Events dropped for capacity since the outbox was created.
    pub dropped: u64,
}

pub struct SessionOutbox {
    state: Mutex<OutboxState>,
    tx: broadcast::Sender<SequencedEvent>,
}

// ── Queue operations ────────────────────────────────────────────────

impl SessionOutbox {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            state: Mutex::new(OutboxState {
                next_seq: 1,
                events: VecDeque::new(),
                capacity: capacity.max(1),
                dropped: 0,
            }),
            tx,
        }
    }

    /// Queues an event and returns its sequence number.
    pub fn push(&self, event: SessionEvent) -> u64 {
        let sequenced = {
            let mut state = self.state();
            let seq = state.next_seq;
            state.next_seq += 1;

            if state.events.len() == state.capacity {
                state.events.pop_front();
                state.dropped += 1;
                warn!(seq, dropped = state.dropped, "session outbox full; dropping oldest event");
            }

            let sequenced = SequencedEvent { seq, event };
            state.events.push_back(sequenced.clone());
            sequenced
        };

        // No receivers is fine; pollers still see the event.
        let seq = sequenced.seq;
        let _ = self.tx.send(sequenced);
        seq
    }

    /// Up to `limit` events with `seq > after`, oldest first.
    pub fn poll(&self, after: u64, limit: usize) -> OutboxPage {
        let state = self.state();
        let limit = limit.clamp(1, MAX_POLL_LIMIT);
        let events: Vec<_> =
            state.events.iter().filter(|event| event.seq > after).take(limit).cloned().collect();
        let next = events.last().map_or(after, |event| event.seq);
        OutboxPage { events, next, dropped: state.dropped }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SequencedEvent> {
        self.tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> MutexGuard<'_, OutboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionOutbox {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
