//! Per-class (T-CONT) packet queue.

use ponsim_types::{Packet, TrafficClass};
use serde::Serialize;
use std::collections::VecDeque;

/// Counters for one class queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub occupied_bytes: u64,
    pub max_bytes: u64,
    pub queued_packets: usize,
    pub received: u64,
    pub dropped: u64,
    pub dropped_bytes: u64,
    pub transmitted_packets: u64,
    pub transmitted_bytes: u64,
    /// Occupancy as a fraction of `max_bytes`.
    pub utilization: f64,
}

/// Byte-bounded FIFO for one traffic class.
///
/// `occupied_bytes <= max_bytes` holds after every operation; a packet that
/// would break it is dropped and counted.
#[derive(Debug, Clone)]
pub struct TContQueue {
    class: TrafficClass,
    max_bytes: u64,
    packets: VecDeque<Packet>,
    occupied_bytes: u64,
    received: u64,
    dropped: u64,
    dropped_bytes: u64,
    transmitted_packets: u64,
    transmitted_bytes: u64,
}

impl TContQueue {
    pub fn new(class: TrafficClass, max_bytes: u64) -> Self {
        Self {
            class,
            max_bytes,
            packets: VecDeque::new(),
            occupied_bytes: 0,
            received: 0,
            dropped: 0,
            dropped_bytes: 0,
            transmitted_packets: 0,
            transmitted_bytes: 0,
        }
    }

    pub fn class(&self) -> TrafficClass {
        self.class
    }

    /// Append a packet. Returns `false` if it was dropped for lack of space.
    pub fn push(&mut self, packet: Packet) -> bool {
        self.received += 1;
        if self.occupied_bytes + packet.size_bytes > self.max_bytes {
            self.dropped += 1;
            self.dropped_bytes += packet.size_bytes;
            return false;
        }
        self.occupied_bytes += packet.size_bytes;
        self.packets.push_back(packet);
        true
    }

    /// Pop whole packets from the head while they fit in `grant_bytes`.
    ///
    /// Stops at the first packet that does not fit; packets are never split.
    pub fn transmit(&mut self, grant_bytes: u64) -> (Vec<Packet>, u64) {
        let mut sent = Vec::new();
        let mut sent_bytes = 0u64;
        while let Some(head) = self.packets.front() {
            if sent_bytes.saturating_add(head.size_bytes) > grant_bytes {
                break;
            }
            let Some(packet) = self.packets.pop_front() else {
                break;
            };
            sent_bytes += packet.size_bytes;
            self.occupied_bytes -= packet.size_bytes;
            sent.push(packet);
        }
        self.transmitted_packets += sent.len() as u64;
        self.transmitted_bytes += sent_bytes;
        (sent, sent_bytes)
    }

    pub fn occupied_bytes(&self) -> u64 {
        self.occupied_bytes
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn utilization(&self) -> f64 {
        if self.max_bytes == 0 {
            return 0.0;
        }
        self.occupied_bytes as f64 / self.max_bytes as f64
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            occupied_bytes: self.occupied_bytes,
            max_bytes: self.max_bytes,
            queued_packets: self.packets.len(),
            received: self.received,
            dropped: self.dropped,
            dropped_bytes: self.dropped_bytes,
            transmitted_packets: self.transmitted_packets,
            transmitted_bytes: self.transmitted_bytes,
            utilization: self.utilization(),
        }
    }

    /// Drop all queued packets; counters are kept.
    pub fn clear(&mut self) {
        self.packets.clear();
        self.occupied_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ponsim_types::{NodeId, PacketId};

    fn packet(seq: u64, size_bytes: u64) -> Packet {
        Packet::new(
            PacketId::new(NodeId(0), seq),
            TrafficClass::Medium,
            size_bytes,
            seq as f64,
        )
    }

    #[test]
    fn test_overflow_drops_and_counts() {
        let mut queue = TContQueue::new(TrafficClass::Medium, 1000);
        assert!(queue.push(packet(0, 600)));
        assert!(!queue.push(packet(1, 500)));
        assert!(queue.push(packet(2, 400)));

        let stats = queue.stats();
        assert_eq!(stats.occupied_bytes, 1000);
        assert_eq!(stats.received, 3);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.dropped_bytes, 500);
        assert_eq!(queue.utilization(), 1.0);
    }

    #[test]
    fn test_occupancy_never_exceeds_cap() {
        let mut queue = TContQueue::new(TrafficClass::Low, 10_000);
        for seq in 0..200 {
            queue.push(packet(seq, 37 + (seq * 131) % 900));
            assert!(queue.occupied_bytes() <= queue.max_bytes());
            if seq % 7 == 0 {
                queue.transmit(1500);
                assert!(queue.occupied_bytes() <= queue.max_bytes());
            }
        }
    }

    #[test]
    fn test_transmit_sends_whole_packets_fifo() {
        let mut queue = TContQueue::new(TrafficClass::High, 10_000);
        queue.push(packet(0, 300));
        queue.push(packet(1, 500));
        queue.push(packet(2, 100));

        // Second packet does not fit, so the third waits behind it
        let (sent, bytes) = queue.transmit(700);
        assert_eq!(sent.iter().map(|p| p.id.seq).collect::<Vec<_>>(), vec![0]);
        assert_eq!(bytes, 300);
        assert_eq!(queue.occupied_bytes(), 600);

        let (sent, bytes) = queue.transmit(u64::MAX);
        assert_eq!(sent.len(), 2);
        assert_eq!(bytes, 600);
        assert!(queue.is_empty());
        assert_eq!(queue.stats().transmitted_bytes, 900);
    }

    #[test]
    fn test_zero_grant_sends_nothing() {
        let mut queue = TContQueue::new(TrafficClass::Highest, 10_000);
        queue.push(packet(0, 1));
        let (sent, bytes) = queue.transmit(0);
        assert!(sent.is_empty());
        assert_eq!(bytes, 0);
        assert_eq!(queue.len(), 1);
    }
}
