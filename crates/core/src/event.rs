//! Events driving the event-stepped simulation.

use ponsim_types::{NodeId, Packet, TrafficClass};
use serde::Serialize;

/// Discriminant of an [`EventPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A node's arrival process fires.
    PacketGenerated,
    /// A granted slot (plus guard interval) has ended.
    TransmissionComplete,
}

/// What happened when a granted slot finished.
///
/// Packets are extracted from the node queue when the grant is issued, so
/// the record carries them to the completion handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransmissionRecord {
    pub node_id: NodeId,
    pub class: TrafficClass,
    pub packets: Vec<Packet>,
    pub transmitted_bytes: u64,
    pub grant_bytes: u64,
    pub slot_start: f64,
    pub slot_end: f64,
    pub slot_duration: f64,
    /// Polling cycle that issued the grant.
    pub cycle_number: u64,
    /// Set on the last grant of a cycle: the cycle's transmission-phase utilization.
    pub cycle_utilization: Option<f64>,
}

impl TransmissionRecord {
    /// A grant that moved no data.
    pub fn is_empty(&self) -> bool {
        self.transmitted_bytes == 0
    }
}

/// Event-specific data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventPayload {
    PacketGenerated,
    TransmissionComplete(TransmissionRecord),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::PacketGenerated => EventKind::PacketGenerated,
            EventPayload::TransmissionComplete(_) => EventKind::TransmissionComplete,
        }
    }
}

/// A timestamped event addressed to one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Simulated time in seconds.
    pub timestamp: f64,
    pub node_id: NodeId,
    pub payload: EventPayload,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
