//! Shared data model for the PON simulator.
//!
//! Everything here is plain data: identifiers, the five traffic classes,
//! the two traffic units (event-stepped [`Packet`], cycle-stepped
//! [`Request`]) and the per-cycle scheduling outcome. Behaviour lives in the
//! crates that own the state.

mod allocation;
mod identifiers;
mod packet;
mod request;
mod traffic;
pub mod units;

pub use allocation::{Allocation, CycleResult};
pub use identifiers::{NodeId, PacketId, RequestId, TrafficUnitId};
pub use packet::Packet;
pub use request::{Request, RequestError};
pub use traffic::{ClassMap, TrafficClass, EMPTY_RANK, NUM_CLASSES};
pub use units::{bytes_to_mb, mb_to_bytes, BYTES_PER_MB};
