//! Event-stepped subscriber node.

use crate::generator::{ArrivalProcess, TrafficGenerator};
use crate::profile::TrafficProfile;
use crate::tcont::{QueueStats, TContQueue};
use crate::NodeError;
use ponsim_core::{EventPayload, EventQueue};
use ponsim_types::{ClassMap, NodeId, Packet, PacketId, TrafficClass};
use serde::Serialize;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OnuStats {
    pub packets_generated: u64,
    pub bytes_generated: u64,
    pub packets_dropped: u64,
    pub bytes_dropped: u64,
    pub packets_transmitted: u64,
    pub bytes_transmitted: u64,
    pub reports_sent: u64,
    pub grants_received: u64,
}

/// A subscriber node driven by the global event queue.
///
/// Generates packets from its own Poisson process into five class queues
/// and only ever exposes per-class byte totals to the head-end.
#[derive(Debug, Clone)]
pub struct Onu {
    id: NodeId,
    profile: TrafficProfile,
    generator: TrafficGenerator,
    arrivals: Option<ArrivalProcess>,
    queues: ClassMap<TContQueue>,
    next_packet_seq: u64,
    stats: OnuStats,
}

impl Onu {
    pub fn new(id: NodeId, profile: TrafficProfile, seed: u64) -> Result<Self, NodeError> {
        profile.validate()?;
        let queues = ClassMap::from_fn(|class| TContQueue::new(class, profile.queue_caps_bytes[class]));
        Ok(Self {
            id,
            profile,
            generator: TrafficGenerator::new(seed),
            arrivals: None,
            queues,
            next_packet_seq: 0,
            stats: OnuStats::default(),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn profile(&self) -> &TrafficProfile {
        &self.profile
    }

    /// Draw the first inter-arrival gap and schedule the first arrival.
    pub fn schedule_first_arrival(
        &mut self,
        queue: &mut EventQueue,
        start_time: f64,
    ) -> Result<f64, NodeError> {
        let start = start_time + self.profile.start_offset;
        let arrivals = ArrivalProcess::new(self.profile.arrival_rate, start, &mut self.generator);
        let first = arrivals.peek();
        self.arrivals = Some(arrivals);
        queue.schedule(first, self.id, EventPayload::PacketGenerated)?;
        Ok(first)
    }

    /// Handle this node's arrival event at `now` and schedule the next one.
    ///
    /// Returns whether the new packet was queued; a full class queue drops
    /// it silently apart from the counters.
    pub fn on_packet_generated(
        &mut self,
        queue: &mut EventQueue,
        now: f64,
    ) -> Result<bool, NodeError> {
        let packet = self.create_packet(now);
        let class = packet.class;
        let size = packet.size_bytes;

        self.stats.packets_generated += 1;
        self.stats.bytes_generated += size;
        let accepted = self.queues[class].push(packet);
        if !accepted {
            self.stats.packets_dropped += 1;
            self.stats.bytes_dropped += size;
            trace!(node = %self.id, %class, size, "Class queue full, packet dropped");
        }

        let next = match self.arrivals.as_mut() {
            Some(arrivals) => {
                arrivals.advance(&mut self.generator);
                arrivals.peek()
            }
            None => {
                // Arrival fired without a scheduled process; start one here
                let arrivals =
                    ArrivalProcess::new(self.profile.arrival_rate, now, &mut self.generator);
                let next = arrivals.peek();
                self.arrivals = Some(arrivals);
                next
            }
        };
        queue.schedule(next.max(now), self.id, EventPayload::PacketGenerated)?;
        Ok(accepted)
    }

    fn create_packet(&mut self, arrival_time: f64) -> Packet {
        let class = self.generator.pick_class(&self.profile.class_weights);
        let size = self.generator.size_bytes(self.profile.class_sizes_mb[class]);
        let id = PacketId::new(self.id, self.next_packet_seq);
        self.next_packet_seq += 1;
        Packet::new(id, class, size, arrival_time)
    }

    /// Per-class occupied bytes, the only view the head-end gets.
    pub fn report(&mut self) -> ClassMap<u64> {
        self.stats.reports_sent += 1;
        self.queues.map(|_, queue| queue.occupied_bytes())
    }

    /// Send whole packets of `class` that fit in `grant_bytes`.
    pub fn transmit(&mut self, class: TrafficClass, grant_bytes: u64) -> (Vec<Packet>, u64) {
        self.stats.grants_received += 1;
        let (packets, bytes) = self.queues[class].transmit(grant_bytes);
        self.stats.packets_transmitted += packets.len() as u64;
        self.stats.bytes_transmitted += bytes;
        (packets, bytes)
    }

    pub fn queue(&self, class: TrafficClass) -> &TContQueue {
        &self.queues[class]
    }

    /// Bytes waiting across all classes.
    pub fn buffered_bytes(&self) -> u64 {
        self.queues.values().map(TContQueue::occupied_bytes).sum()
    }

    /// Fill level across all classes, as a fraction of total capacity.
    pub fn buffer_occupancy(&self) -> f64 {
        let capacity: u64 = self.queues.values().map(TContQueue::max_bytes).sum();
        if capacity == 0 {
            return 0.0;
        }
        self.buffered_bytes() as f64 / capacity as f64
    }

    pub fn queue_stats(&self) -> ClassMap<QueueStats> {
        self.queues.map(|_, queue| queue.stats())
    }

    pub fn stats(&self) -> OnuStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn onu(seed: u64) -> Onu {
        Onu::new(NodeId(0), TrafficProfile::new(1000.0), seed).unwrap()
    }

    fn run_arrivals(node: &mut Onu, queue: &mut EventQueue, count: usize) {
        node.schedule_first_arrival(queue, 0.0).unwrap();
        for _ in 0..count {
            let event = queue.pop_next().unwrap();
            node.on_packet_generated(queue, event.timestamp).unwrap();
        }
    }

    #[test]
    fn test_arrivals_reschedule_themselves() {
        let mut node = onu(1);
        let mut queue = EventQueue::new();
        run_arrivals(&mut node, &mut queue, 25);

        assert_eq!(queue.len(), 1);
        assert_eq!(node.stats().packets_generated, 25);
        assert!(queue.peek_time() >= queue.current_time());
    }

    #[test]
    fn test_report_is_idempotent() {
        let mut node = onu(2);
        let mut queue = EventQueue::new();
        run_arrivals(&mut node, &mut queue, 40);

        let first = node.report();
        let second = node.report();
        assert_eq!(first, second);
        assert_eq!(first.total(), node.buffered_bytes());
        assert_eq!(node.stats().reports_sent, 2);
    }

    #[traced_test]
    #[test]
    fn test_queues_stay_within_caps() {
        let caps = ClassMap::splat(64 * 1024);
        let profile = TrafficProfile::new(1000.0).with_queue_caps_bytes(caps);
        let mut node = Onu::new(NodeId(3), profile, 4).unwrap();
        let mut queue = EventQueue::new();
        run_arrivals(&mut node, &mut queue, 500);

        for class in TrafficClass::ALL {
            assert!(node.queue(class).occupied_bytes() <= node.queue(class).max_bytes());
        }
        let stats = node.stats();
        assert!(stats.packets_dropped > 0);
        assert_eq!(
            stats.packets_dropped,
            node.queue_stats().values().map(|s| s.dropped).sum::<u64>()
        );
        assert!(logs_contain("Class queue full, packet dropped"));
    }

    #[test]
    fn test_transmit_drains_granted_class_only() {
        let mut node = onu(5);
        let mut queue = EventQueue::new();
        run_arrivals(&mut node, &mut queue, 60);

        let before = node.report();
        let class = TrafficClass::ALL
            .into_iter()
            .find(|c| before[*c] > 0)
            .unwrap();
        let (packets, bytes) = node.transmit(class, u64::MAX);

        assert_eq!(bytes, before[class]);
        assert!(packets.iter().all(|p| p.class == class && p.node_id == NodeId(0)));
        let after = node.report();
        assert_eq!(after[class], 0);
        for other in TrafficClass::ALL.into_iter().filter(|c| *c != class) {
            assert_eq!(after[other], before[other]);
        }
    }

    #[test]
    fn test_same_seed_same_traffic() {
        let mut a = onu(77);
        let mut b = onu(77);
        let mut qa = EventQueue::new();
        let mut qb = EventQueue::new();
        run_arrivals(&mut a, &mut qa, 30);
        run_arrivals(&mut b, &mut qb, 30);

        assert_eq!(a.report(), b.report());
        assert_eq!(qa.peek_time(), qb.peek_time());
    }
}
