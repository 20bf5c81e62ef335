//! Named traffic scenario presets.

use crate::profile::{Range, TrafficProfile};
use crate::NodeError;
use ponsim_types::ClassMap;
use serde::Serialize;

/// Arrival rates below this are raised to it.
pub const MIN_ARRIVAL_RATE: f64 = 5.0;

/// A static bundle of traffic parameters describing a kind of subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficScenario {
    pub name: &'static str,
    pub description: &'static str,
    /// Per-class activity range: class weights in event mode, request
    /// probabilities (range midpoint) in cycle mode.
    pub probability_ranges: ClassMap<Range>,
    /// SLA range handed to nodes, in Mbps.
    pub sla_range: Range,
    /// Fraction of the SLA the scenario aims to load.
    pub target_utilization: f64,
    pub request_size_mb: f64,
    pub inter_arrival_ms_target: f64,
}

impl TrafficScenario {
    pub const NAMES: [&'static str; 4] = [
        "residential_light",
        "residential_medium",
        "residential_heavy",
        "enterprise",
    ];

    /// Basic browsing.
    pub fn residential_light() -> Self {
        Self {
            name: "residential_light",
            description: "Light residential use: basic browsing",
            probability_ranges: ClassMap::new((0.1, 0.3), (0.2, 0.4), (0.3, 0.6), (0.4, 0.7), (0.1, 0.3)),
            sla_range: (50.0, 150.0),
            target_utilization: 0.5,
            request_size_mb: 0.012,
            inter_arrival_ms_target: 25.0,
        }
    }

    /// HD streaming and video calls.
    pub fn residential_medium() -> Self {
        Self {
            name: "residential_medium",
            description: "Typical residential use: HD streaming, video calls",
            probability_ranges: ClassMap::new((0.2, 0.5), (0.3, 0.6), (0.4, 0.7), (0.3, 0.6), (0.1, 0.3)),
            sla_range: (100.0, 300.0),
            target_utilization: 0.6,
            request_size_mb: 0.015,
            inter_arrival_ms_target: 15.0,
        }
    }

    /// 4K streaming and gaming.
    pub fn residential_heavy() -> Self {
        Self {
            name: "residential_heavy",
            description: "Heavy residential use: 4K streaming, gaming",
            probability_ranges: ClassMap::new((0.4, 0.7), (0.5, 0.8), (0.6, 0.9), (0.3, 0.6), (0.2, 0.4)),
            sla_range: (200.0, 500.0),
            target_utilization: 0.7,
            request_size_mb: 0.018,
            inter_arrival_ms_target: 10.0,
        }
    }

    /// Business-critical applications.
    pub fn enterprise() -> Self {
        Self {
            name: "enterprise",
            description: "Enterprise use: critical applications, VoIP",
            probability_ranges: ClassMap::new((0.6, 0.9), (0.7, 0.9), (0.5, 0.8), (0.4, 0.7), (0.3, 0.5)),
            sla_range: (300.0, 800.0),
            target_utilization: 0.8,
            request_size_mb: 0.020,
            inter_arrival_ms_target: 8.0,
        }
    }

    /// Look a preset up by name.
    pub fn from_name(name: &str) -> Result<Self, NodeError> {
        match name.trim() {
            "residential_light" => Ok(Self::residential_light()),
            "residential_medium" => Ok(Self::residential_medium()),
            "residential_heavy" => Ok(Self::residential_heavy()),
            "enterprise" => Ok(Self::enterprise()),
            other => Err(NodeError::UnknownScenario {
                name: other.to_string(),
                available: Self::NAMES.join(", "),
            }),
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::residential_light(),
            Self::residential_medium(),
            Self::residential_heavy(),
            Self::enterprise(),
        ]
    }

    /// Midpoint of every class range.
    pub fn midpoint_probabilities(&self) -> ClassMap<f64> {
        self.probability_ranges.map(|_, (min, max)| (min + max) / 2.0)
    }

    /// Expected number of active classes per request.
    pub fn average_active_classes(&self) -> f64 {
        self.midpoint_probabilities().total()
    }

    /// Arrival rate (requests/s) that loads `sla_mbps` to the target
    /// utilization, never below [`MIN_ARRIVAL_RATE`].
    pub fn arrival_rate_for(&self, sla_mbps: f64) -> f64 {
        let target_mbps = sla_mbps * self.target_utilization;
        let denominator = self.request_size_mb * 8.0 * self.average_active_classes();
        if denominator <= 0.0 {
            return MIN_ARRIVAL_RATE;
        }
        (target_mbps / denominator).max(MIN_ARRIVAL_RATE)
    }

    /// Node profile for a subscriber with the given SLA.
    pub fn profile_for(&self, sla_mbps: f64) -> TrafficProfile {
        TrafficProfile::default()
            .with_class_weights(self.probability_ranges)
            .with_request_probabilities(self.midpoint_probabilities())
            .with_arrival_rate(self.arrival_rate_for(sla_mbps))
            .with_sla_mbps(sla_mbps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_named_preset_resolves() {
        for name in TrafficScenario::NAMES {
            let scenario = TrafficScenario::from_name(name).unwrap();
            assert_eq!(scenario.name, name);
            scenario.profile_for(100.0).validate().unwrap();
        }
        assert_eq!(TrafficScenario::all().len(), TrafficScenario::NAMES.len());
    }

    #[test]
    fn test_unknown_scenario_is_an_error() {
        let err = TrafficScenario::from_name("datacenter").unwrap_err();
        assert!(matches!(err, NodeError::UnknownScenario { .. }));
        assert!(err.to_string().contains("residential_medium"));
    }

    #[test]
    fn test_arrival_rate_formula() {
        let scenario = TrafficScenario::residential_medium();
        // Midpoints: 0.35 + 0.45 + 0.55 + 0.45 + 0.2 = 2.0
        assert!((scenario.average_active_classes() - 2.0).abs() < 1e-12);

        let rate = scenario.arrival_rate_for(100.0);
        let expected = 100.0 * 0.6 / (0.015 * 8.0 * 2.0);
        assert!((rate - expected).abs() < 1e-9);

        // Floor applies to tiny SLAs
        assert_eq!(scenario.arrival_rate_for(0.1), MIN_ARRIVAL_RATE);
    }
}
