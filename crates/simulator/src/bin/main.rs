//! PON Simulator CLI
//!
//! Run deterministic PON DBA experiments with configurable parameters.
//!
//! # Example
//!
//! ```bash
//! # Event-driven run of 8 ONUs with a fixed seed
//! ponsim --seed 42 -n 8 --scenario residential_heavy --dba priority -d 5
//!
//! # 2000 fixed cycles, 4 replications, JSON report on disk
//! ponsim --mode cycles --steps 2000 --replications 4 --output report.json
//! ```

use clap::Parser;
use ponsim_dba::available_strategies;
use ponsim_node::{FragmentPolicy, TrafficScenario};
use ponsim_simulation::{RunLength, SimulationMode};
use ponsim_simulator::{Simulator, SimulatorConfig, SimulatorError};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// PON Simulator
///
/// Simulates upstream bandwidth allocation on a passive optical network.
/// Each run is single-threaded and reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "ponsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of ONUs
    #[arg(short = 'n', long, default_value = "4")]
    onus: usize,

    /// Traffic scenario preset
    #[arg(long, default_value = "residential_medium")]
    scenario: String,

    /// Stepping mode: events or cycles
    #[arg(short = 'm', long, default_value = "events")]
    mode: SimulationMode,

    /// DBA strategy
    #[arg(long, default_value = "fcfs")]
    dba: String,

    /// Simulated duration in seconds
    #[arg(short = 'd', long, default_value = "1.0", conflicts_with = "steps")]
    duration: f64,

    /// Number of polling cycles to run instead of a duration
    #[arg(long)]
    steps: Option<u64>,

    /// Random seed for reproducible results. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Upstream capacity in Mbps
    #[arg(long, default_value = "1024")]
    capacity: f64,

    /// What happens to the part of a request that does not fit its slot: drop or requeue
    #[arg(long, default_value = "drop")]
    fragment_policy: FragmentPolicy,

    /// Independent runs over derived seeds, executed in parallel
    #[arg(short = 'r', long, default_value = "1")]
    replications: usize,

    /// Print the full report as JSON instead of the summary
    #[arg(long)]
    json: bool,

    /// Also write the JSON report to this file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// List the available DBA strategies and exit
    #[arg(long)]
    list_strategies: bool,

    /// List the traffic scenario presets and exit
    #[arg(long)]
    list_scenarios: bool,
}

fn main() -> Result<(), SimulatorError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("warn,ponsim_simulator=info,ponsim_simulation=info")
        }))
        .init();

    let args = Args::parse();

    if args.list_strategies {
        for name in available_strategies() {
            println!("{name}");
        }
        return Ok(());
    }
    if args.list_scenarios {
        for scenario in TrafficScenario::all() {
            println!(
                "{:<20} {} (SLA {:.0}-{:.0} Mbps)",
                scenario.name, scenario.description, scenario.sla_range.0, scenario.sla_range.1
            );
        }
        return Ok(());
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    let length = match args.steps {
        Some(steps) => RunLength::Steps(steps),
        None => RunLength::Duration(args.duration),
    };

    info!(
        onus = args.onus,
        scenario = %args.scenario,
        mode = %args.mode,
        dba = %args.dba,
        seed,
        capacity_mbps = args.capacity,
        replications = args.replications,
        ?length,
        "Starting simulation"
    );

    let config = SimulatorConfig::new(args.onus, args.scenario)
        .with_mode(args.mode)
        .with_dba(args.dba)
        .with_capacity_mbps(args.capacity)
        .with_fragment_policy(args.fragment_policy)
        .with_seed(seed)
        .with_replications(args.replications);

    let report = Simulator::new(config)?.run(length)?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        report.print_summary();
    }

    if let Some(path) = args.output {
        report.write_json(&path)?;
        info!(path = %path.display(), "Report written");
    }

    Ok(())
}
