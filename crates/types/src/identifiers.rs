//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscriber node (ONU) identifier.
///
/// Node ids are dense: the node at index `i` of a network carries `NodeId(i)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index of this node in a dense node vector.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Node id for a position in a dense node vector.
    pub fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "onu_{}", self.0)
    }
}

/// Packet identifier, unique within a run.
///
/// Packets are numbered per node, so the pair is globally unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PacketId {
    /// Node that generated the packet.
    pub node: NodeId,
    /// Per-node sequence number, starting at zero.
    pub seq: u64,
}

impl PacketId {
    /// Create a packet id.
    pub fn new(node: NodeId, seq: u64) -> Self {
        Self { node, seq }
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_pkt_{}", self.node, self.seq)
    }
}

/// Request identifier for the cycle-stepped traffic unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId {
    /// Node whose buffer owns the request.
    pub node: NodeId,
    /// Per-node sequence number, starting at zero.
    pub seq: u64,
}

impl RequestId {
    /// Create a request id.
    pub fn new(node: NodeId, seq: u64) -> Self {
        Self { node, seq }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_req_{}", self.node, self.seq)
    }
}

/// Identifier of whatever unit an allocation carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrafficUnitId {
    /// A whole packet (event-stepped mode).
    Packet(PacketId),
    /// A request, possibly fragmented (cycle-stepped mode).
    Request(RequestId),
}

impl fmt::Display for TrafficUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrafficUnitId::Packet(id) => id.fmt(f),
            TrafficUnitId::Request(id) => id.fmt(f),
        }
    }
}
