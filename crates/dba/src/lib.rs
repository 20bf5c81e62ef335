//! Dynamic bandwidth allocation (DBA) strategies.
//!
//! A strategy answers two questions for the head-end:
//!
//! - **How much** may each node send this round ([`DbaStrategy::allocate_bandwidth`])
//! - **Which** buffered request goes next ([`DbaStrategy::select_next_request`])
//!
//! Strategies are swappable at runtime and carry no simulation state.
//!
//! | name | policy |
//! |---|---|
//! | `fcfs` | globally oldest request first |
//! | `priority` | most urgent class first, starved requests promoted |
//! | `rl` | weights from an external [`ActionPolicy`], equal-share fallback |
//! | `limited` | full report up to a per-node cap |
//! | `gated` | full report |
//! | `ipact` | capped, with an optional floor |

mod discipline;
mod error;
mod fcfs;
mod priority;
mod registry;
mod rl;
mod strategy;

pub use discipline::{GatedStrategy, IpactStrategy, LimitedStrategy, DEFAULT_MAX_GRANT_BYTES};
pub use error::DbaError;
pub use fcfs::FcfsStrategy;
pub use priority::{PriorityStrategy, DEFAULT_STARVATION_THRESHOLD_MS};
pub use registry::{
    available_strategies, build_strategy, build_strategy_with, parse_strategy, DbaOptions,
    StrategyKind,
};
pub use rl::{ActionPolicy, RlStrategy, StaticPolicy};
pub use strategy::{equal_share, BandwidthMap, DbaStrategy, PendingRequests};
