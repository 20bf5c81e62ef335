//! End-to-end runs through the public runner API.

use ponsim_dba::available_strategies;
use ponsim_node::{TrafficProfile, TrafficScenario};
use ponsim_simulation::{
    CycleObserver, OverflowPolicy, ResourceLimits, RunLength, SimulationConfig, SimulationMode,
    SimulationResults, SimulationRunner,
};
use ponsim_types::CycleResult;
use std::cell::RefCell;
use std::rc::Rc;

fn profiles(count: usize) -> Vec<TrafficProfile> {
    let scenario = TrafficScenario::residential_medium();
    (0..count)
        .map(|i| {
            scenario
                .profile_for(100.0 + 25.0 * i as f64)
                .with_start_offset(i as f64 * 1e-3)
        })
        .collect()
}

fn run(config: SimulationConfig, length: RunLength) -> SimulationResults {
    let mut runner = SimulationRunner::new(config).unwrap();
    runner.run(length).unwrap()
}

#[test]
fn test_same_seed_same_results() {
    for mode in [SimulationMode::Events, SimulationMode::Cycles] {
        let config = SimulationConfig::new(mode, profiles(4)).with_seed(7);
        let first = run(config.clone(), RunLength::Duration(0.3));
        let second = run(config, RunLength::Duration(0.3));

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn test_different_seeds_diverge() {
    let base = SimulationConfig::new(SimulationMode::Events, profiles(4));
    let a = run(base.clone().with_seed(1), RunLength::Duration(0.3));
    let b = run(base.with_seed(2), RunLength::Duration(0.3));

    assert!(!a.episode_metrics.delays.is_empty());
    assert_ne!(a.episode_metrics.delays, b.episode_metrics.delays);
}

#[test]
fn test_every_strategy_runs_in_both_modes() {
    for name in available_strategies() {
        for mode in [SimulationMode::Events, SimulationMode::Cycles] {
            let config = SimulationConfig::new(mode, profiles(3))
                .with_dba(*name)
                .with_seed(11);
            let results = run(config, RunLength::Duration(0.2));

            assert_eq!(results.summary.faults, 0, "{name} in {mode}");
            assert!(results.simulation_stats.total_requests > 0, "{name} in {mode}");
            assert!(results.simulation_stats.successful_requests > 0, "{name} in {mode}");
        }
    }
}

#[test]
fn test_event_slots_never_overlap() {
    let config = SimulationConfig::new(SimulationMode::Events, profiles(6)).with_seed(3);
    let mut runner = SimulationRunner::new(config).unwrap();
    runner.run(RunLength::Duration(0.5)).unwrap();

    let olt = runner.olt().unwrap();
    let log = olt.channel().slots().log();
    assert!(!log.is_empty());
    for pair in log.iter().collect::<Vec<_>>().windows(2) {
        assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
    }
}

#[test]
fn test_cycle_slots_stay_in_their_cycle() {
    let config = SimulationConfig::new(SimulationMode::Cycles, profiles(6)).with_seed(3);
    let mut runner = SimulationRunner::new(config).unwrap();
    let cycle_duration = runner.config().cycle_duration;
    runner.run(RunLength::Steps(400)).unwrap();

    let log = runner.scheduler().unwrap().channel().slots().log();
    assert!(!log.is_empty());
    for pair in log.iter().collect::<Vec<_>>().windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
    for record in log {
        let cycle_start = (record.start / cycle_duration).floor() * cycle_duration;
        assert!(record.end <= cycle_start + cycle_duration + 1e-12);
    }
}

#[test]
fn test_delays_are_never_negative() {
    let config = SimulationConfig::new(SimulationMode::Events, profiles(4)).with_seed(21);
    let results = run(config, RunLength::Duration(0.5));

    assert!(!results.episode_metrics.delays.is_empty());
    for sample in &results.episode_metrics.delays {
        assert!(sample.delay >= 0.0);
        assert!(sample.time <= results.simulation_stats.simulation_time);
    }
    assert!(results.performance_metrics.p95_delay >= 0.0);
    assert!(results.performance_metrics.mean_delay >= 0.0);
}

#[test]
fn test_queue_limit_policies() {
    let tight = ResourceLimits {
        max_queued_events: 2,
        check_interval: 1,
        ..Default::default()
    };

    let aborted = run(
        SimulationConfig::new(SimulationMode::Events, profiles(4)).with_limits(tight),
        RunLength::Duration(0.2),
    );
    assert!(aborted.summary.aborted);
    assert!(aborted.summary.abort_reason.is_some());
    assert!(aborted.simulation_stats.simulation_time < 0.2);

    let relaxed = ResourceLimits {
        overflow_policy: OverflowPolicy::Continue,
        ..tight
    };
    let continued = run(
        SimulationConfig::new(SimulationMode::Events, profiles(4)).with_limits(relaxed),
        RunLength::Duration(0.2),
    );
    assert!(!continued.summary.aborted);
    assert!(continued.summary.warnings >= 1);
    assert_eq!(continued.simulation_stats.simulation_time, 0.2);
}

#[test]
fn test_metric_storage_is_bounded() {
    let limits = ResourceLimits {
        max_metric_samples: 50,
        max_buffer_history: 4,
        ..Default::default()
    };
    let config = SimulationConfig::new(SimulationMode::Events, profiles(6))
        .with_seed(5)
        .with_limits(limits);
    let results = run(config, RunLength::Duration(1.0));

    assert!(results.episode_metrics.delays.len() <= 50);
    assert!(results.episode_metrics.buffer_levels_history.len() <= 4);
    assert!(results.summary.metric_evictions > 0);
}

#[derive(Debug, Default)]
struct Calls {
    init: u32,
    starts: u64,
    ends: Vec<u64>,
    finished: u32,
}

struct Recorder(Rc<RefCell<Calls>>);

impl CycleObserver for Recorder {
    fn on_init(&mut self) {
        self.0.borrow_mut().init += 1;
    }

    fn on_cycle_start(&mut self, _cycle_number: u64, _cycle_time: f64) {
        self.0.borrow_mut().starts += 1;
    }

    fn on_cycle_end(&mut self, result: &CycleResult) {
        self.0.borrow_mut().ends.push(result.cycle_number);
    }

    fn on_simulation_end(&mut self, _results: &SimulationResults) {
        self.0.borrow_mut().finished += 1;
    }
}

#[test]
fn test_observer_sees_every_cycle() {
    let calls = Rc::new(RefCell::new(Calls::default()));
    let config = SimulationConfig::new(SimulationMode::Cycles, profiles(2));
    let mut runner = SimulationRunner::new(config)
        .unwrap()
        .with_observer(Recorder(calls.clone()));

    runner.run(RunLength::Steps(10)).unwrap();
    runner.step().unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.init, 1);
    assert_eq!(calls.starts, 11);
    assert_eq!(calls.ends, (0..11).collect::<Vec<_>>());
    assert_eq!(calls.finished, 1);
}
