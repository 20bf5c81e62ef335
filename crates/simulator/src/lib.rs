//! PON Simulator
//!
//! Experiment front end built on top of the simulation framework.
//! Turns a handful of settings into a full network, runs it over several
//! seeds and summarizes the outcome.
//!
//! # Architecture
//!
//! The simulator builds on `ponsim-simulation` to provide:
//!
//! - **Network Construction**: scenario presets with an SLA ladder per ONU
//! - **Replications**: independent seeds run in parallel
//! - **Metrics Collection**: latency percentiles, throughput, fairness
//! - **Configuration**: builder-style setup and the `ponsim` CLI
//!
//! # Example
//!
//! ```ignore
//! use ponsim_simulation::RunLength;
//! use ponsim_simulator::{Simulator, SimulatorConfig};
//!
//! // 8 ONUs with medium residential traffic, 5 seeds
//! let config = SimulatorConfig::new(8, "residential_medium")
//!     .with_dba("priority")
//!     .with_replications(5);
//!
//! let report = Simulator::new(config)?.run(RunLength::Duration(2.0))?;
//! println!("P99 latency: {} us", report.latency.p99_us);
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod runner;

pub use config::SimulatorConfig;
pub use error::SimulatorError;
pub use metrics::{LatencySummary, SimulationReport};
pub use runner::Simulator;
