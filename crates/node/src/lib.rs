//! Subscriber node (ONU) agents.
//!
//! Two agents share one traffic model:
//!
//! - [`Onu`] (event-stepped): a Poisson packet process feeding five
//!   byte-bounded class queues; reports per-class byte totals and sends
//!   whole packets against class grants.
//! - [`CycleOnu`] (cycle-stepped): a count-bounded buffer of multi-class
//!   requests, caught up to the poll time on every report and flushed
//!   through the shared [`ponsim_core::Channel`].
//!
//! Every agent owns a [`TrafficGenerator`] seeded at construction, so a run
//! is reproducible from its master seed ([`derive_seeds`]).

mod buffer;
mod cycle_onu;
mod error;
mod generator;
mod onu;
mod profile;
mod scenario;
mod tcont;

pub use buffer::{BufferStats, RequestBuffer, DEFAULT_BUFFER_CAPACITY};
pub use cycle_onu::{CycleOnu, CycleOnuStats, FragmentPolicy, Transmission};
pub use error::NodeError;
pub use generator::{derive_seeds, ArrivalProcess, ArrivalStats, TrafficGenerator};
pub use onu::{Onu, OnuStats};
pub use profile::{Range, TrafficProfile};
pub use scenario::{TrafficScenario, MIN_ARRIVAL_RATE};
pub use tcont::{QueueStats, TContQueue};
