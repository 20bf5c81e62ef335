//! Event-stepped traffic unit.

use crate::{NodeId, PacketId, TrafficClass};
use serde::{Deserialize, Serialize};

/// An immutable demand record created when traffic arrives at a node.
///
/// Packets are consumed whole: a grant either carries the full packet or
/// leaves it queued for a later cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    pub node_id: NodeId,
    pub class: TrafficClass,
    pub size_bytes: u64,
    /// Simulated arrival time in seconds.
    pub arrival_time: f64,
}

impl Packet {
    /// Create a packet. The id's node is taken as the owning node.
    pub fn new(id: PacketId, class: TrafficClass, size_bytes: u64, arrival_time: f64) -> Self {
        Self {
            id,
            node_id: id.node,
            class,
            size_bytes,
            arrival_time,
        }
    }

    /// Time spent in the system if the packet completes at `completion_time`.
    pub fn delay_until(&self, completion_time: f64) -> f64 {
        completion_time - self.arrival_time
    }
}
