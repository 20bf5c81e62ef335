//! The shared upstream channel used by both stepping modes.

use crate::time_slot::{Slot, TimeSlotAllocator};
use crate::CoreError;
use ponsim_types::{units::mbps_to_mb_per_sec, NodeId, Request, TrafficClass};
use serde::Serialize;
use tracing::{trace, warn};

/// Cumulative link counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LinkStats {
    pub transmitted_mb: f64,
    pub busy_time: f64,
    pub transmissions: u64,
    pub fragments: u64,
}

/// What a flush moved onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlushOutcome {
    /// Megabytes carried by the slot.
    pub sent_mb: f64,
    /// Megabytes that did not fit; zero when the request went out whole.
    pub fragment_mb: f64,
    pub slot: Slot,
}

impl FlushOutcome {
    pub fn is_fragmented(&self) -> bool {
        self.fragment_mb > 0.0
    }
}

/// Single upstream wavelength shared by every node.
///
/// Owns the only `busy_until` in a run; every grant, in either mode, is
/// serialized through here.
#[derive(Debug, Clone)]
pub struct Channel {
    slots: TimeSlotAllocator,
    stats: LinkStats,
}

impl Channel {
    pub fn new(capacity_mbps: f64) -> Result<Self, CoreError> {
        Ok(Self {
            slots: TimeSlotAllocator::new(capacity_mbps)?,
            stats: LinkStats::default(),
        })
    }

    /// Bound the slot log kept by the underlying allocator.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.slots = self.slots.with_log_capacity(capacity);
        self
    }

    pub fn capacity_mbps(&self) -> f64 {
        self.slots.capacity_mbps()
    }

    /// Megabytes the link can carry in `slot_duration` seconds.
    pub fn max_payload_mb(&self, slot_duration: f64) -> f64 {
        if slot_duration <= 0.0 {
            return 0.0;
        }
        mbps_to_mb_per_sec(self.capacity_mbps()) * slot_duration
    }

    /// Reserve a slot for a byte grant of one class.
    pub fn grant(
        &mut self,
        node_id: NodeId,
        class: TrafficClass,
        size_mb: f64,
        earliest_start: f64,
    ) -> Slot {
        let slot = self
            .slots
            .allocate(node_id, Some(class), size_mb, earliest_start);
        self.record(size_mb.max(0.0), slot);
        slot
    }

    /// The slot `flush` would give `request`, leaving the channel untouched.
    pub fn peek_flush(&self, request: &Request, slot_duration: f64, earliest_start: f64) -> Slot {
        let sent_mb = request
            .total_traffic_mb()
            .min(self.max_payload_mb(slot_duration));
        self.slots.peek(sent_mb, earliest_start)
    }

    /// Put as much of `request` on the wire as fits in `slot_duration`.
    ///
    /// Anything beyond `capacity * slot_duration / 8` MB is reported as a
    /// fragment; whether the fragment survives is the caller's decision.
    /// Bit errors are not modelled, every flush succeeds.
    pub fn flush(
        &mut self,
        request: &Request,
        slot_duration: f64,
        earliest_start: f64,
    ) -> FlushOutcome {
        let total_mb = request.total_traffic_mb();
        let max_mb = self.max_payload_mb(slot_duration);
        let sent_mb = total_mb.min(max_mb);
        let fragment_mb = (total_mb - sent_mb).max(0.0);

        if fragment_mb > 0.0 {
            self.stats.fragments += 1;
            warn!(
                request = %request.id(),
                total_mb,
                max_mb,
                fragment_mb,
                "Request exceeds slot payload, transmitting fragment"
            );
        }

        let slot = self.slots.allocate(
            request.node_id(),
            request.dominant_class(),
            sent_mb,
            earliest_start,
        );
        self.record(sent_mb, slot);

        trace!(
            request = %request.id(),
            sent_mb,
            start = slot.start,
            end = slot.end,
            "Flushed request"
        );

        FlushOutcome {
            sent_mb,
            fragment_mb,
            slot,
        }
    }

    fn record(&mut self, size_mb: f64, slot: Slot) {
        if slot.duration() <= 0.0 {
            return;
        }
        self.stats.transmitted_mb += size_mb;
        self.stats.busy_time += slot.duration();
        self.stats.transmissions += 1;
    }

    /// Seconds needed to carry `size_mb` on this link.
    pub fn transmission_time(&self, size_mb: f64) -> f64 {
        self.slots.transmission_time(size_mb)
    }

    pub fn busy_until(&self) -> f64 {
        self.slots.busy_until()
    }

    /// Busy percentage of the link over `total_time`, capped at 100.
    pub fn utilization(&self, total_time: f64) -> f64 {
        self.slots.utilization(total_time)
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn slots(&self) -> &TimeSlotAllocator {
        &self.slots
    }

    pub fn reset(&mut self) {
        self.slots.reset();
        self.stats = LinkStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ponsim_types::{ClassMap, RequestId};
    use tracing_test::traced_test;

    fn request(seq: u64, traffic: ClassMap<f64>) -> Request {
        Request::new(RequestId::new(NodeId(1), seq), traffic, 0.0)
    }

    #[test]
    fn test_flush_whole_request() {
        let mut channel = Channel::new(1024.0).unwrap();
        let req = request(0, ClassMap::new(0.0, 0.001, 0.0, 0.0, 0.0));

        // 128 MB/s for 75 us carries 0.0096 MB
        let outcome = channel.flush(&req, 75e-6, 0.0);

        assert!(!outcome.is_fragmented());
        assert_eq!(outcome.sent_mb, 0.001);
        assert_eq!(outcome.slot.start, 0.0);
        assert_eq!(channel.stats().transmissions, 1);
        assert_eq!(channel.stats().fragments, 0);
    }

    #[traced_test]
    #[test]
    fn test_flush_oversized_request_fragments() {
        let mut channel = Channel::new(1024.0).unwrap();
        let req = request(0, ClassMap::new(0.01, 0.0, 0.0, 0.0, 0.0));

        let outcome = channel.flush(&req, 75e-6, 0.0);

        assert!(outcome.is_fragmented());
        assert!((outcome.sent_mb - 0.0096).abs() < 1e-12);
        assert!((outcome.fragment_mb - 0.0004).abs() < 1e-12);
        assert!((outcome.slot.duration() - 75e-6).abs() < 1e-12);
        assert_eq!(channel.stats().fragments, 1);
        assert!(logs_contain("transmitting fragment"));
    }

    #[test]
    fn test_peek_flush_matches_flush() {
        let mut channel = Channel::new(1024.0).unwrap();
        channel.grant(NodeId(2), TrafficClass::Low, 0.01, 0.0);
        let req = request(1, ClassMap::new(0.01, 0.0, 0.0, 0.0, 0.0));

        let planned = channel.peek_flush(&req, 75e-6, 0.0);
        assert_eq!(channel.stats().transmissions, 1);
        assert_eq!(planned.start, channel.busy_until());

        let outcome = channel.flush(&req, 75e-6, 0.0);
        assert_eq!(outcome.slot, planned);
    }

    #[test]
    fn test_grants_and_flushes_share_busy_until() {
        let mut channel = Channel::new(1024.0).unwrap();
        let first = channel.grant(NodeId(0), TrafficClass::High, 0.001, 0.0);
        let req = request(1, ClassMap::new(0.0, 0.0, 0.002, 0.0, 0.0));
        let second = channel.flush(&req, 1.0, 0.0);

        assert_eq!(second.slot.start, first.end);
        assert_eq!(channel.busy_until(), second.slot.end);
        assert!((channel.stats().transmitted_mb - 0.003).abs() < 1e-12);
    }

    #[test]
    fn test_empty_grant_is_not_counted() {
        let mut channel = Channel::new(1024.0).unwrap();
        let slot = channel.grant(NodeId(0), TrafficClass::Low, 0.0, 2.0);

        assert_eq!(slot.duration(), 0.0);
        assert_eq!(channel.stats(), LinkStats::default());
        assert_eq!(channel.utilization(1.0), 0.0);
    }
}
