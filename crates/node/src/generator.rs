//! Seeded random draws for traffic generation.

use crate::profile::Range;
use ponsim_types::{mb_to_bytes, ClassMap, TrafficClass};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

/// Class used when no weight is positive.
const FALLBACK_CLASS: TrafficClass = TrafficClass::Medium;

/// Derive one independent seed per node from a master seed.
pub fn derive_seeds(master_seed: u64, count: usize) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(master_seed);
    (0..count).map(|_| rng.next_u64()).collect()
}

/// All randomness a node agent uses, behind one seeded stream.
#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    rng: ChaCha8Rng,
}

impl TrafficGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Exponential sample with mean `1 / rate`.
    pub fn exponential(&mut self, rate: f64) -> f64 {
        let u: f64 = self.rng.gen();
        -(1.0 - u).ln() / rate
    }

    /// Uniform sample from an inclusive range.
    pub fn uniform(&mut self, (min, max): Range) -> f64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Weighted class choice, with every weight re-drawn from its range.
    pub fn pick_class(&mut self, weight_ranges: &ClassMap<Range>) -> TrafficClass {
        let weights: Vec<f64> = weight_ranges.values().map(|r| self.uniform(*r)).collect();
        match WeightedIndex::new(&weights) {
            Ok(index) => TrafficClass::ALL[index.sample(&mut self.rng)],
            Err(_) => FALLBACK_CLASS,
        }
    }

    /// Packet size in whole bytes, at least one.
    pub fn size_bytes(&mut self, range_mb: Range) -> u64 {
        mb_to_bytes(self.uniform(range_mb)).max(1)
    }

    /// Per-class demand of one request: each class is present with its own
    /// probability and, when present, sized uniformly from its range.
    pub fn request_traffic(
        &mut self,
        probabilities: &ClassMap<f64>,
        sizes_mb: &ClassMap<Range>,
    ) -> ClassMap<f64> {
        ClassMap::from_fn(|class| {
            if self.bernoulli(probabilities[class]) {
                self.uniform(sizes_mb[class])
            } else {
                0.0
            }
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ArrivalStats {
    pub theoretical_rate: f64,
    pub empirical_rate: f64,
    pub arrivals: u64,
    pub last_arrival_time: f64,
    pub average_interarrival: f64,
}

/// Poisson arrival clock with a fixed rate.
///
/// Always holds the time of the next arrival, so callers can ask whether an
/// arrival is due without consuming it.
#[derive(Debug, Clone)]
pub struct ArrivalProcess {
    rate: f64,
    next_arrival: f64,
    last_arrival: f64,
    arrivals: u64,
    average_interarrival: f64,
}

impl ArrivalProcess {
    /// Start the clock at `start`, drawing the first gap immediately.
    pub fn new(rate: f64, start: f64, generator: &mut TrafficGenerator) -> Self {
        let gap = generator.exponential(rate);
        Self {
            rate,
            next_arrival: start + gap,
            last_arrival: start,
            arrivals: 0,
            average_interarrival: 0.0,
        }
    }

    /// Time of the next arrival.
    pub fn peek(&self) -> f64 {
        self.next_arrival
    }

    /// Consume the pending arrival and draw the one after it.
    pub fn advance(&mut self, generator: &mut TrafficGenerator) -> f64 {
        let arrival = self.next_arrival;
        let gap = arrival - self.last_arrival;
        self.arrivals += 1;
        self.average_interarrival += (gap - self.average_interarrival) / self.arrivals as f64;
        self.last_arrival = arrival;
        self.next_arrival = arrival + generator.exponential(self.rate);
        arrival
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn empirical_rate(&self) -> f64 {
        if self.average_interarrival > 0.0 {
            1.0 / self.average_interarrival
        } else {
            0.0
        }
    }

    pub fn stats(&self) -> ArrivalStats {
        ArrivalStats {
            theoretical_rate: self.rate,
            empirical_rate: self.empirical_rate(),
            arrivals: self.arrivals,
            last_arrival_time: self.last_arrival,
            average_interarrival: self.average_interarrival,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = TrafficGenerator::new(42);
        let mut b = TrafficGenerator::new(42);
        let ranges = ClassMap::splat((0.1, 0.9));
        for _ in 0..100 {
            assert_eq!(a.exponential(10.0), b.exponential(10.0));
            assert_eq!(a.pick_class(&ranges), b.pick_class(&ranges));
        }
    }

    #[test]
    fn test_derived_seeds_differ() {
        let seeds = derive_seeds(7, 4);
        assert_eq!(seeds, derive_seeds(7, 4));
        let mut unique = seeds.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_zero_weights_fall_back_to_medium() {
        let mut generator = TrafficGenerator::new(1);
        let ranges = ClassMap::splat((0.0, 0.0));
        assert_eq!(generator.pick_class(&ranges), TrafficClass::Medium);
    }

    #[test]
    fn test_single_weighted_class_always_chosen() {
        let mut generator = TrafficGenerator::new(3);
        let mut ranges = ClassMap::splat((0.0, 0.0));
        ranges[TrafficClass::Low] = (0.2, 0.5);
        for _ in 0..50 {
            assert_eq!(generator.pick_class(&ranges), TrafficClass::Low);
        }
    }

    #[test]
    fn test_sizes_stay_in_range() {
        let mut generator = TrafficGenerator::new(9);
        for _ in 0..500 {
            let size = generator.size_bytes((0.001, 0.005));
            assert!((1048..=5243).contains(&size), "size {size} out of range");
        }
        assert_eq!(generator.size_bytes((0.0, 0.0)), 1);
    }

    #[test]
    fn test_request_traffic_respects_probabilities() {
        let mut generator = TrafficGenerator::new(5);
        let probabilities = ClassMap::new(1.0, 0.0, 1.0, 0.0, 0.0);
        let sizes = ClassMap::splat((0.01, 0.02));
        let traffic = generator.request_traffic(&probabilities, &sizes);

        assert!(traffic[TrafficClass::Highest] >= 0.01);
        assert_eq!(traffic[TrafficClass::High], 0.0);
        assert!(traffic[TrafficClass::Medium] <= 0.02);
    }

    #[test]
    fn test_arrival_process_is_monotonic() {
        let mut generator = TrafficGenerator::new(11);
        let mut arrivals = ArrivalProcess::new(100.0, 0.5, &mut generator);
        assert!(arrivals.peek() >= 0.5);

        let mut last = 0.5;
        for _ in 0..1000 {
            let t = arrivals.advance(&mut generator);
            assert!(t >= last);
            last = t;
        }

        // Empirical rate should be in the right ballpark for 1000 samples
        let rate = arrivals.empirical_rate();
        assert!(rate > 80.0 && rate < 120.0, "rate {rate}");
        assert_eq!(arrivals.stats().arrivals, 1000);
    }
}
