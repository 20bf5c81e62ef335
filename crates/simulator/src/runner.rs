//! Replicated runs over independent seeds.

use crate::{SimulationReport, SimulatorConfig, SimulatorError};
use ponsim_node::derive_seeds;
use ponsim_simulation::{RunLength, SimulationResults, SimulationRunner};
use rayon::prelude::*;
use tracing::{debug, info};

/// Runs the configured network once per replication.
///
/// Replications execute in parallel on the rayon pool; each one is a
/// single-threaded deterministic run, so the report only depends on the
/// configuration and seed.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// The configured seed first, then seeds derived from it.
    pub fn replication_seeds(&self) -> Vec<u64> {
        let extra = self.config.replications.saturating_sub(1);
        std::iter::once(self.config.seed)
            .chain(derive_seeds(self.config.seed, extra))
            .collect()
    }

    /// One run with `seed`, on the calling thread.
    pub fn run_once(&self, seed: u64, length: RunLength) -> Result<SimulationResults, SimulatorError> {
        let mut runner = SimulationRunner::new(self.config.to_simulation_config(seed)?)?;
        let results = runner.run(length)?;
        debug!(
            seed,
            delivered = results.simulation_stats.successful_requests,
            "Replication finished"
        );
        Ok(results)
    }

    /// Every replication, collected in seed order.
    pub fn run(&self, length: RunLength) -> Result<SimulationReport, SimulatorError> {
        let seeds = self.replication_seeds();
        info!(
            onus = self.config.num_onus,
            scenario = %self.config.scenario,
            mode = %self.config.mode,
            dba = %self.config.dba,
            replications = seeds.len(),
            "Starting replications"
        );

        let results = seeds
            .par_iter()
            .map(|&seed| self.run_once(seed, length))
            .collect::<Result<Vec<_>, _>>()?;

        let report = SimulationReport::new(self.config.scenario.clone(), self.config.num_onus, results)?;
        info!(
            p99_us = report.latency.p99_us,
            success_rate = report.success_rate,
            aborted = report.aborted_runs,
            "Replications finished"
        );
        Ok(report)
    }
}
