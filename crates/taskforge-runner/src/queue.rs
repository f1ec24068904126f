//! In-memory event queue and per-task dedup state (spec §4.11 event
//! handling, §5 concurrency model). Both are process-wide and mutex/DashMap
//! guarded, mirroring `SchedulerEngine`'s single-connection-plus-mpsc shape
//! generalized to a shared queue multiple event-source tasks push into.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use taskforge_core::types::EventPayload;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub task_id: Uuid,
    pub payload: EventPayload,
}

/// FIFO queue that keeps only the latest event per task: pushing an event
/// for a task already queued replaces that entry in place of appending a
/// second one (spec §4.11: "keeping only the latest event per task").
#[derive(Default)]
pub struct EventQueue {
    inner: Mutex<VecDeque<QueuedEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: QueuedEvent) {
        let mut q = self.inner.lock().unwrap();
        q.retain(|e| e.task_id != event.task_id);
        q.push_back(event);
    }

    pub fn pop_oldest(&self) -> Option<QueuedEvent> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tracks the last time an event was accepted for a task, to enforce
/// `event_dedupe_ms` (spec invariant 9: "at most one execution enqueued per
/// dedupe window").
#[derive(Default)]
pub struct DedupeTracker {
    last_event_at: DashMap<Uuid, DateTime<Utc>>,
}

impl DedupeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` (and records `now`) if this event should proceed,
    /// `false` if it falls within `dedupe_ms` of the last accepted event for
    /// the same task and must be dropped.
    pub fn accept(&self, task_id: Uuid, now: DateTime<Utc>, dedupe_ms: u64) -> bool {
        if let Some(last) = self.last_event_at.get(&task_id) {
            if (now - *last).num_milliseconds() < dedupe_ms as i64 {
                return false;
            }
        }
        self.last_event_at.insert(task_id, now);
        true
    }
}
