//! Cycle-stepped traffic unit.

use crate::{ClassMap, NodeId, RequestId, TrafficClass, EMPTY_RANK};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invariant violations on a [`Request`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("request {id}: departure {departure} precedes creation {created_at}")]
    DepartureBeforeCreation {
        id: RequestId,
        departure: f64,
        created_at: f64,
    },

    #[error("request {id}: departure already recorded at {departure}")]
    DepartureAlreadySet { id: RequestId, departure: f64 },
}

/// A bundle of per-class demand waiting in a node's buffer.
///
/// The only mutation after creation is the single departure-time write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    id: RequestId,
    node_id: NodeId,
    /// Demand per class in megabytes. Zero means the class is absent.
    traffic: ClassMap<f64>,
    created_at: f64,
    departure_time: f64,
}

impl Request {
    /// Create a request that has not departed yet.
    pub fn new(id: RequestId, traffic: ClassMap<f64>, created_at: f64) -> Self {
        Self {
            id,
            node_id: id.node,
            traffic,
            created_at,
            departure_time: f64::INFINITY,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn traffic(&self) -> &ClassMap<f64> {
        &self.traffic
    }

    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    /// Departure time, or `+inf` while still buffered.
    pub fn departure_time(&self) -> f64 {
        self.departure_time
    }

    pub fn has_departed(&self) -> bool {
        self.departure_time.is_finite()
    }

    /// Record the departure time.
    ///
    /// Fails if the time precedes creation or a departure was already written.
    pub fn set_departure_time(&mut self, departure: f64) -> Result<(), RequestError> {
        if self.has_departed() {
            return Err(RequestError::DepartureAlreadySet {
                id: self.id,
                departure: self.departure_time,
            });
        }
        if departure.is_nan() || departure < self.created_at {
            return Err(RequestError::DepartureBeforeCreation {
                id: self.id,
                departure,
                created_at: self.created_at,
            });
        }
        self.departure_time = departure;
        Ok(())
    }

    /// Time from creation to departure, `+inf` while still buffered.
    pub fn delay(&self) -> f64 {
        if self.has_departed() {
            self.departure_time - self.created_at
        } else {
            f64::INFINITY
        }
    }

    /// Total demand across all classes, in megabytes.
    pub fn total_traffic_mb(&self) -> f64 {
        self.traffic.values().filter(|mb| **mb > 0.0).sum()
    }

    /// Most urgent class that carries traffic.
    pub fn dominant_class(&self) -> Option<TrafficClass> {
        self.traffic
            .iter()
            .find(|(_, mb)| **mb > 0.0)
            .map(|(class, _)| class)
    }

    /// Priority rank of the most urgent class present, [`EMPTY_RANK`] if none.
    pub fn priority_rank(&self) -> u32 {
        self.dominant_class()
            .map(TrafficClass::rank)
            .unwrap_or(EMPTY_RANK)
    }

    /// The part of this request left after `sent_mb` went out.
    ///
    /// Transmission drains classes in priority order, so the remainder keeps
    /// the least urgent traffic. The remainder inherits `created_at` so its
    /// eventual delay still counts from the original arrival.
    pub fn remainder_after(&self, sent_mb: f64, id: RequestId) -> Request {
        let mut budget = sent_mb.max(0.0);
        let mut traffic = self.traffic;
        for (_, mb) in traffic.iter_mut() {
            if *mb <= 0.0 {
                continue;
            }
            let taken = (*mb).min(budget);
            *mb -= taken;
            budget -= taken;
        }
        Request::new(id, traffic, self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(traffic: ClassMap<f64>, created_at: f64) -> Request {
        Request::new(RequestId::new(NodeId(0), 1), traffic, created_at)
    }

    #[test]
    fn test_new_request_has_not_departed() {
        let req = request(ClassMap::splat(0.0), 1.0);
        assert!(!req.has_departed());
        assert!(req.departure_time().is_infinite());
        assert!(req.delay().is_infinite());
    }

    #[test]
    fn test_departure_before_creation_is_rejected() {
        let mut req = request(ClassMap::splat(0.1), 2.0);
        let err = req.set_departure_time(1.5).unwrap_err();
        assert!(matches!(err, RequestError::DepartureBeforeCreation { .. }));

        // State untouched by the failed write
        assert!(!req.has_departed());

        req.set_departure_time(2.5).unwrap();
        assert!((req.delay() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_departure_written_once() {
        let mut req = request(ClassMap::splat(0.1), 0.0);
        req.set_departure_time(1.0).unwrap();
        assert!(matches!(
            req.set_departure_time(2.0),
            Err(RequestError::DepartureAlreadySet { .. })
        ));
        assert_eq!(req.departure_time(), 1.0);
    }

    #[test]
    fn test_priority_rank_uses_most_urgent_class() {
        let req = request(ClassMap::new(0.0, 0.0, 0.02, 0.0, 0.001), 0.0);
        assert_eq!(req.dominant_class(), Some(TrafficClass::Medium));
        assert_eq!(req.priority_rank(), 3);

        let empty = request(ClassMap::splat(0.0), 0.0);
        assert_eq!(empty.dominant_class(), None);
        assert_eq!(empty.priority_rank(), EMPTY_RANK);
    }

    #[test]
    fn test_remainder_drains_urgent_classes_first() {
        let req = request(ClassMap::new(0.1, 0.0, 0.2, 0.0, 0.3), 4.0);
        let rest = req.remainder_after(0.25, RequestId::new(NodeId(0), 2));

        assert_eq!(rest.traffic()[TrafficClass::Highest], 0.0);
        assert!((rest.traffic()[TrafficClass::Medium] - 0.05).abs() < 1e-12);
        assert!((rest.traffic()[TrafficClass::Lowest] - 0.3).abs() < 1e-12);
        assert!((rest.total_traffic_mb() - 0.35).abs() < 1e-12);
        assert_eq!(rest.created_at(), 4.0);
        assert_eq!(rest.id().seq, 2);
    }
}
