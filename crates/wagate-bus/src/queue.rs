// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session bounded FIFO of events.
//!
//! Each session gets its own ring of at most `capacity` events. When a ring
//! is full the oldest entry is evicted to admit the new one, so the queue
//! always holds the most recent events in their original order.
//!
//! One mutex guards the whole map: enqueue and flush for any session are
//! mutually exclusive, and every operation is O(1) amortized.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use wagate_core::Event;

/// Default per-session capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Bounded per-session event buffer.
#[derive(Debug)]
pub struct SessionEventQueue {
    capacity: usize,
    sessions: Mutex<HashMap<String, VecDeque<Event>>>,
}

impl SessionEventQueue {
    /// Create a queue holding at most `capacity` events per session (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Event>>> {
        // Entries stay structurally valid even if a holder panicked.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event to its session's queue.
    ///
    /// Returns the evicted event when the queue was already full.
    pub fn enqueue(&self, event: Event) -> Option<Event> {
        let mut sessions = self.lock();
        let queue = sessions
            .entry(event.session_id.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity.min(64)));

        let evicted = if queue.len() >= self.capacity {
            queue.pop_front()
        } else {
            None
        };
        if let Some(ref old) = evicted {
            warn!(
                session_id = %old.session_id,
                event_id = %old.id,
                capacity = self.capacity,
                "session queue full, evicted oldest event"
            );
        }
        queue.push_back(event);
        evicted
    }

    /// Remove and return every queued event for a session, oldest first.
    pub fn flush_session(&self, session_id: &str) -> Vec<Event> {
        let drained: Vec<Event> = self
            .lock()
            .remove(session_id)
            .map(Vec::from)
            .unwrap_or_default();
        if !drained.is_empty() {
            debug!(session_id, count = drained.len(), "flushed session queue");
        }
        drained
    }

    /// Remove and return every queued event, grouped by session.
    ///
    /// Each group is in enqueue order; groups come out sorted by session ID.
    pub fn flush_all(&self) -> Vec<(String, Vec<Event>)> {
        let mut drained: Vec<(String, Vec<Event>)> = self
            .lock()
            .drain()
            .map(|(id, q)| (id, Vec::from(q)))
            .collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        drained
    }

    /// Number of events queued for a session.
    pub fn size(&self, session_id: &str) -> usize {
        self.lock().get(session_id).map_or(0, VecDeque::len)
    }

    /// Number of events queued across all sessions.
    pub fn total(&self) -> usize {
        self.lock().values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values().all(VecDeque::is_empty)
    }
}

impl Default for SessionEventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
