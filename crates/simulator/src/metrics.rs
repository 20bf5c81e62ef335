//! Aggregated report over replicated runs.

use crate::SimulatorError;
use hdrhistogram::Histogram;
use ponsim_simulation::{SimulationMode, SimulationResults};
use serde::Serialize;
use std::path::Path;

/// Queueing delay percentiles, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub mean_us: f64,
    pub min_us: u64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencySummary {
    /// Summarize delays given in seconds.
    pub fn from_delays(delays: impl IntoIterator<Item = f64>) -> Result<Self, SimulatorError> {
        let mut histogram = Histogram::<u64>::new(3)?;
        for delay in delays {
            histogram.record((delay.max(0.0) * 1e6).round() as u64)?;
        }
        if histogram.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            samples: histogram.len(),
            mean_us: histogram.mean(),
            min_us: histogram.min(),
            p50_us: histogram.value_at_quantile(0.50),
            p90_us: histogram.value_at_quantile(0.90),
            p95_us: histogram.value_at_quantile(0.95),
            p99_us: histogram.value_at_quantile(0.99),
            max_us: histogram.max(),
        })
    }
}

/// Results of every replication plus figures averaged across them.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub mode: SimulationMode,
    pub dba: String,
    pub num_onus: usize,
    pub seeds: Vec<u64>,
    /// Latency over the retained delay samples of all replications.
    pub latency: LatencySummary,
    pub mean_delay: f64,
    pub mean_throughput: f64,
    pub network_utilization: f64,
    pub jain_fairness: f64,
    pub success_rate: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub faults: u64,
    pub aborted_runs: usize,
    pub replications: Vec<SimulationResults>,
}

impl SimulationReport {
    pub fn new(
        scenario: impl Into<String>,
        num_onus: usize,
        replications: Vec<SimulationResults>,
    ) -> Result<Self, SimulatorError> {
        let latency = LatencySummary::from_delays(
            replications
                .iter()
                .flat_map(|r| r.episode_metrics.delays.iter().map(|s| s.delay)),
        )?;

        let average = |f: fn(&SimulationResults) -> f64| -> f64 {
            if replications.is_empty() {
                0.0
            } else {
                replications.iter().map(f).sum::<f64>() / replications.len() as f64
            }
        };

        let (mode, dba) = replications
            .first()
            .map(|r| (r.summary.mode, r.summary.dba.clone()))
            .unwrap_or_default();

        Ok(Self {
            scenario: scenario.into(),
            mode,
            dba,
            num_onus,
            seeds: replications.iter().map(|r| r.summary.seed).collect(),
            latency,
            mean_delay: average(|r| r.performance_metrics.mean_delay),
            mean_throughput: average(|r| r.performance_metrics.mean_throughput),
            network_utilization: average(|r| r.performance_metrics.network_utilization),
            jain_fairness: average(|r| r.performance_metrics.jain_fairness_per_node),
            success_rate: average(|r| r.simulation_stats.success_rate),
            total_requests: replications.iter().map(|r| r.simulation_stats.total_requests).sum(),
            successful_requests: replications
                .iter()
                .map(|r| r.simulation_stats.successful_requests)
                .sum(),
            faults: replications.iter().map(|r| r.summary.faults).sum(),
            aborted_runs: replications.iter().filter(|r| r.summary.aborted).count(),
            replications,
        })
    }

    pub fn to_json(&self) -> Result<String, SimulatorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SimulatorError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn print_summary(&self) {
        println!("\n=== PON Simulation Report ===");
        println!(
            "Scenario: {}  Mode: {}  DBA: {}  ONUs: {}",
            self.scenario, self.mode, self.dba, self.num_onus
        );
        println!("Replications: {} (seeds {:?})", self.seeds.len(), self.seeds);

        println!("\n=== Traffic ===");
        println!("Requests generated: {}", self.total_requests);
        println!("Requests delivered: {}", self.successful_requests);
        println!("Success rate: {:.2}%", self.success_rate);
        println!("Mean throughput: {:.3} MB/s", self.mean_throughput);
        println!("Network utilization: {:.2}%", self.network_utilization);
        println!("Jain fairness: {:.4}", self.jain_fairness);

        println!("\n=== Latency ===");
        if self.latency.samples == 0 {
            println!("No delay samples recorded");
        } else {
            println!("Samples: {}", self.latency.samples);
            println!("Mean: {:.1} us", self.latency.mean_us);
            println!(
                "P50: {} us  P90: {} us  P95: {} us  P99: {} us",
                self.latency.p50_us, self.latency.p90_us, self.latency.p95_us, self.latency.p99_us
            );
            println!("Min: {} us  Max: {} us", self.latency.min_us, self.latency.max_us);
        }

        if self.faults > 0 || self.aborted_runs > 0 {
            println!("\n=== Problems ===");
            println!("Faults: {}", self.faults);
            println!("Aborted runs: {}", self.aborted_runs);
            for (seed, reason) in self
                .replications
                .iter()
                .filter_map(|r| Some((r.summary.seed, r.summary.abort_reason.as_ref()?)))
            {
                println!("  seed {seed}: {reason}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_summary_in_microseconds() {
        let delays = (1..=100).map(|i| i as f64 * 1e-3);
        let summary = LatencySummary::from_delays(delays).unwrap();

        assert_eq!(summary.samples, 100);
        assert!((summary.min_us as f64 - 1_000.0).abs() <= 1.0);
        assert!((summary.max_us as f64 - 100_000.0).abs() <= 100.0);
        assert!((summary.p50_us as f64 - 50_000.0).abs() <= 50.0);
        assert!((summary.p99_us as f64 - 99_000.0).abs() <= 100.0);
        assert!((summary.mean_us - 50_500.0).abs() <= 50.0);
    }

    #[test]
    fn test_latency_summary_keeps_long_delays() {
        let summary = LatencySummary::from_delays([0.0, 0.5e-3, 2.0]).unwrap();

        assert_eq!(summary.samples, 3);
        assert_eq!(summary.min_us, 0);
        assert!(summary.max_us >= 1_999_000 && summary.max_us <= 2_002_000);
        assert!(summary.p50_us >= 499 && summary.p50_us <= 501);
    }

    #[test]
    fn test_latency_summary_empty() {
        let summary = LatencySummary::from_delays(std::iter::empty()).unwrap();
        assert_eq!(summary, LatencySummary::default());
    }

    #[test]
    fn test_empty_report() {
        let report = SimulationReport::new("enterprise", 0, Vec::new()).unwrap();
        assert_eq!(report.mean_delay, 0.0);
        assert!(report.seeds.is_empty());
        assert_eq!(report.aborted_runs, 0);
    }
}
