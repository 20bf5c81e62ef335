//! Collision-free serialization of upstream channel time.

use crate::CoreError;
use ponsim_types::{units::mbps_to_mb_per_sec, NodeId, TrafficClass};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::trace;

/// Default number of slot records kept for inspection.
pub const DEFAULT_SLOT_LOG_CAPACITY: usize = 50_000;

/// A granted transmission window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Slot {
    pub start: f64,
    pub end: f64,
}

impl Slot {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// True if the two half-open windows share any instant.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One issued slot, as kept in the allocator log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotRecord {
    pub node_id: NodeId,
    pub class: Option<TrafficClass>,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub size_mb: f64,
}

/// Issues non-overlapping windows on a single shared channel.
///
/// Slots are handed out strictly in call order; the allocator never
/// reorders. `busy_until` only moves forward.
#[derive(Debug, Clone)]
pub struct TimeSlotAllocator {
    capacity_mbps: f64,
    busy_until: f64,
    log: VecDeque<SlotRecord>,
    log_capacity: usize,
    busy_time: f64,
    slots_issued: u64,
}

impl TimeSlotAllocator {
    /// Create an allocator for a channel of `capacity_mbps`.
    pub fn new(capacity_mbps: f64) -> Result<Self, CoreError> {
        if !(capacity_mbps.is_finite() && capacity_mbps > 0.0) {
            return Err(CoreError::InvalidCapacity(capacity_mbps));
        }
        Ok(Self {
            capacity_mbps,
            busy_until: 0.0,
            log: VecDeque::new(),
            log_capacity: DEFAULT_SLOT_LOG_CAPACITY,
            busy_time: 0.0,
            slots_issued: 0,
        })
    }

    /// Keep at most `capacity` records in the slot log.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn capacity_mbps(&self) -> f64 {
        self.capacity_mbps
    }

    /// Seconds needed to carry `size_mb`; zero for empty or negative sizes.
    pub fn transmission_time(&self, size_mb: f64) -> f64 {
        if size_mb <= 0.0 || size_mb.is_nan() {
            return 0.0;
        }
        size_mb / mbps_to_mb_per_sec(self.capacity_mbps)
    }

    /// The window `allocate` would hand out for `size_mb`, without booking it.
    pub fn peek(&self, size_mb: f64, earliest_start: f64) -> Slot {
        let duration = self.transmission_time(size_mb);
        if duration <= 0.0 {
            return Slot {
                start: earliest_start,
                end: earliest_start,
            };
        }
        let start = earliest_start.max(self.busy_until);
        Slot {
            start,
            end: start + duration,
        }
    }

    /// Reserve the next free window of the channel for `size_mb`.
    ///
    /// `start = max(earliest_start, busy_until)`. Zero-sized requests get the
    /// empty window `(earliest_start, earliest_start)` and leave the channel
    /// untouched.
    pub fn allocate(
        &mut self,
        node_id: NodeId,
        class: Option<TrafficClass>,
        size_mb: f64,
        earliest_start: f64,
    ) -> Slot {
        let duration = self.transmission_time(size_mb);
        let Slot { start, end } = self.peek(size_mb, earliest_start);
        if duration <= 0.0 {
            return Slot { start, end };
        }

        self.busy_until = end;
        self.busy_time += duration;
        self.slots_issued += 1;

        trace!(
            node = %node_id,
            class = ?class,
            start,
            end,
            size_mb,
            "Allocated time slot"
        );

        if self.log_capacity > 0 {
            if self.log.len() >= self.log_capacity {
                self.log.pop_front();
            }
            self.log.push_back(SlotRecord {
                node_id,
                class,
                start,
                end,
                duration,
                size_mb,
            });
        }

        Slot { start, end }
    }

    /// Percentage of `total_time` the channel spent transmitting, capped at 100.
    pub fn utilization(&self, total_time: f64) -> f64 {
        if self.slots_issued == 0 || total_time <= 0.0 {
            return 0.0;
        }
        (self.busy_time / total_time * 100.0).min(100.0)
    }

    /// End of the last issued slot.
    pub fn busy_until(&self) -> f64 {
        self.busy_until
    }

    /// Total transmission time issued so far.
    pub fn busy_time(&self) -> f64 {
        self.busy_time
    }

    pub fn slots_issued(&self) -> u64 {
        self.slots_issued
    }

    /// The most recent slot records, oldest first.
    pub fn log(&self) -> &VecDeque<SlotRecord> {
        &self.log
    }

    pub fn reset(&mut self) {
        self.busy_until = 0.0;
        self.busy_time = 0.0;
        self.slots_issued = 0;
        self.log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_megabyte_at_1024_mbps() {
        let mut slots = TimeSlotAllocator::new(1024.0).unwrap();
        let slot = slots.allocate(NodeId(0), Some(TrafficClass::High), 1.0, 0.0);

        assert_eq!(slots.transmission_time(1.0), 0.0078125);
        assert_eq!(slot, Slot {
            start: 0.0,
            end: 0.0078125
        });
        assert_eq!(slots.busy_until(), 0.0078125);
    }

    #[test]
    fn test_slots_never_overlap() {
        let mut slots = TimeSlotAllocator::new(1024.0).unwrap();
        let mut issued = Vec::new();

        // Interleave early and late earliest-start hints
        for (i, earliest) in [0.0, 0.0, 0.5, 0.001, 0.002, 0.7, 0.0].iter().enumerate() {
            let size = 0.1 * (i as f64 + 1.0);
            issued.push(slots.allocate(NodeId(i as u32), None, size, *earliest));
        }

        for (i, a) in issued.iter().enumerate() {
            for b in issued.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }

        // Call order is preserved: each slot starts at or after the previous end
        for pair in issued.windows(2) {
            assert!(pair[1].start >= pair[0].end);
        }
    }

    #[test]
    fn test_start_respects_earliest_hint() {
        let mut slots = TimeSlotAllocator::new(1024.0).unwrap();
        slots.allocate(NodeId(0), None, 0.001, 0.0);

        let late = slots.allocate(NodeId(1), None, 0.001, 3.0);
        assert_eq!(late.start, 3.0);
    }

    #[test]
    fn test_zero_size_leaves_channel_untouched() {
        let mut slots = TimeSlotAllocator::new(1024.0).unwrap();
        let slot = slots.allocate(NodeId(0), None, 0.0, 1.5);

        assert_eq!(slot, Slot { start: 1.5, end: 1.5 });
        assert_eq!(slots.busy_until(), 0.0);
        assert!(slots.log().is_empty());
        assert_eq!(slots.transmission_time(-2.0), 0.0);
    }

    #[test]
    fn test_utilization_matches_sum_of_durations() {
        let mut slots = TimeSlotAllocator::new(800.0).unwrap();
        let sizes = [0.5, 1.25, 2.0, 0.25];
        let mut expected_busy = 0.0;
        for size in sizes {
            let slot = slots.allocate(NodeId(0), None, size, 0.0);
            expected_busy += slot.duration();
        }

        let total_time = 1.0;
        let expected = expected_busy / total_time * 100.0;
        assert!((slots.utilization(total_time) - expected).abs() < 1e-9);

        // Capped at 100 when the window is shorter than the busy time
        assert_eq!(slots.utilization(expected_busy / 2.0), 100.0);
        assert_eq!(slots.utilization(0.0), 0.0);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut slots = TimeSlotAllocator::new(1024.0).unwrap().with_log_capacity(3);
        for i in 0..5 {
            slots.allocate(NodeId(i), None, 0.01, 0.0);
        }

        assert_eq!(slots.log().len(), 3);
        assert_eq!(slots.log().front().map(|r| r.node_id), Some(NodeId(2)));
        assert_eq!(slots.slots_issued(), 5);
    }

    #[test]
    fn test_rejects_invalid_capacity() {
        assert!(TimeSlotAllocator::new(0.0).is_err());
        assert!(TimeSlotAllocator::new(f64::INFINITY).is_err());
    }
}
