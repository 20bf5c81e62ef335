//! Event queue with deterministic ordering.

use crate::event::{Event, EventPayload};
use crate::CoreError;
use ponsim_types::NodeId;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::trace;

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Sequence number (insertion order for equal times)
#[derive(Debug, Clone, Copy)]
pub struct EventKey {
    /// When this event should be processed.
    pub time: f64,
    /// Sequence number for deterministic FIFO ordering.
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Order by time first
        match self.time.total_cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Then by sequence (FIFO)
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

/// Global chronological queue and simulation clock.
///
/// Popping an event advances the clock to its timestamp. Scheduling into the
/// past is rejected so the clock never moves backwards.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: BTreeMap<EventKey, Event>,
    sequence: u64,
    current_time: f64,
    processed: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event for `node_id` at `timestamp`.
    pub fn schedule(
        &mut self,
        timestamp: f64,
        node_id: NodeId,
        payload: EventPayload,
    ) -> Result<EventKey, CoreError> {
        if !timestamp.is_finite() {
            return Err(CoreError::NonFiniteTimestamp(timestamp));
        }
        if timestamp < self.current_time {
            return Err(CoreError::TimestampInPast {
                timestamp,
                now: self.current_time,
            });
        }

        let key = EventKey {
            time: timestamp,
            sequence: self.sequence,
        };
        self.sequence += 1;

        trace!(
            time = timestamp,
            node = %node_id,
            kind = ?payload.kind(),
            "Scheduled event"
        );

        self.events.insert(
            key,
            Event {
                timestamp,
                node_id,
                payload,
            },
        );
        Ok(key)
    }

    /// Remove and return the earliest event, advancing the clock.
    pub fn pop_next(&mut self) -> Option<Event> {
        let (key, event) = self.events.pop_first()?;
        self.current_time = key.time;
        self.processed += 1;
        Some(event)
    }

    /// Timestamp of the earliest pending event, `+inf` when empty.
    pub fn peek_time(&self) -> f64 {
        self.events
            .first_key_value()
            .map(|(key, _)| key.time)
            .unwrap_or(f64::INFINITY)
    }

    pub fn has_pending(&self) -> bool {
        !self.events.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time of the most recently popped event.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Events scheduled since creation (or the last clear).
    pub fn scheduled_total(&self) -> u64 {
        self.sequence
    }

    /// Events popped since creation (or the last clear).
    pub fn processed_total(&self) -> u64 {
        self.processed
    }

    /// Drop every pending event and rewind the clock to zero.
    pub fn clear(&mut self) {
        self.events.clear();
        self.sequence = 0;
        self.current_time = 0.0;
        self.processed = 0;
    }
}
