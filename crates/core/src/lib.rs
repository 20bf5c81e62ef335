//! Simulation clock primitives.
//!
//! Everything that decides *when* something happens on the shared upstream
//! channel lives here. Both stepping modes drive the same primitives.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  EventQueue (BTreeMap<EventKey, Event>)              │
//! │  Ordered by: time, insertion sequence                │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ poll before every event
//!                            ▼
//! ┌──────────────────────────────────────────────────────┐
//! │  CycleTimeManager                                    │
//! │  n-th cycle starts at n * T  (report/allocate/tx)    │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ grants in priority order
//!                            ▼
//! ┌──────────────────────────────────────────────────────┐
//! │  Channel ── TimeSlotAllocator (busy_until)           │
//! │  start = max(earliest, busy_until), never overlaps   │
//! └──────────────────────────────────────────────────────┘
//! ```

mod channel;
mod cycle;
mod error;
mod event;
mod event_queue;
mod time_slot;

pub use channel::{Channel, FlushOutcome, LinkStats};
pub use cycle::{
    CyclePhases, CycleStatistics, CycleTimeManager, PhaseFractions, PhaseWindow,
    DEFAULT_CYCLE_DURATION,
};
pub use error::CoreError;
pub use event::{Event, EventKind, EventPayload, TransmissionRecord};
pub use event_queue::{EventKey, EventQueue};
pub use time_slot::{Slot, SlotRecord, TimeSlotAllocator, DEFAULT_SLOT_LOG_CAPACITY};
