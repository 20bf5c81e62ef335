//! Cycle-stepped subscriber node.

use crate::buffer::{BufferStats, RequestBuffer};
use crate::generator::{ArrivalProcess, ArrivalStats, TrafficGenerator};
use crate::profile::TrafficProfile;
use crate::NodeError;
use ponsim_core::{Channel, FlushOutcome};
use ponsim_types::{NodeId, Request, RequestId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, trace};

/// Requests seeded into the buffer when a node is created.
const INITIAL_REQUESTS: usize = 2;

/// What happens to the part of a request that did not fit its slot.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FragmentPolicy {
    /// Discard the remainder and count it.
    #[default]
    Drop,
    /// Put the remainder back at the head of the buffer.
    Requeue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CycleOnuStats {
    pub requests_generated: u64,
    pub requests_lost: u64,
    pub polls_received: u64,
    pub responses_sent: u64,
    /// Megabytes put on the wire.
    pub data_transmitted_mb: f64,
    pub fragments_dropped: u64,
    pub fragment_mb_dropped: f64,
    pub fragments_requeued: u64,
}

/// Result of one `transmit` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    /// The request as it left the node, departure time set.
    pub request: Request,
    pub outcome: FlushOutcome,
    /// Id of the requeued remainder, if any.
    pub requeued: Option<RequestId>,
}

/// A subscriber node polled once per cycle.
///
/// Holds one bounded buffer of multi-class requests. Arrivals are only
/// materialised when the head-end polls, up to the poll time.
#[derive(Debug, Clone)]
pub struct CycleOnu {
    id: NodeId,
    profile: TrafficProfile,
    generator: TrafficGenerator,
    arrivals: ArrivalProcess,
    buffer: RequestBuffer,
    next_request_seq: u64,
    stats: CycleOnuStats,
}

impl CycleOnu {
    /// Create a node with a couple of requests already waiting at time zero.
    pub fn new(id: NodeId, profile: TrafficProfile, seed: u64) -> Result<Self, NodeError> {
        profile.validate()?;
        let mut generator = TrafficGenerator::new(seed);
        let arrivals =
            ArrivalProcess::new(profile.arrival_rate, profile.start_offset, &mut generator);
        let buffer = RequestBuffer::new(profile.buffer_capacity);

        let mut node = Self {
            id,
            profile,
            generator,
            arrivals,
            buffer,
            next_request_seq: 0,
            stats: CycleOnuStats::default(),
        };
        for _ in 0..INITIAL_REQUESTS {
            let request = node.create_request(0.0);
            node.enqueue(request, 0.0);
        }
        Ok(node)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn profile(&self) -> &TrafficProfile {
        &self.profile
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = RequestId::new(self.id, self.next_request_seq);
        self.next_request_seq += 1;
        id
    }

    fn create_request(&mut self, created_at: f64) -> Request {
        let traffic = self.generator.request_traffic(
            &self.profile.request_probabilities,
            &self.profile.class_sizes_mb,
        );
        self.stats.requests_generated += 1;
        let id = self.next_request_id();
        Request::new(id, traffic, created_at)
    }

    fn enqueue(&mut self, request: Request, time: f64) {
        let id = request.id();
        if !self.buffer.push(request) {
            self.stats.requests_lost += 1;
            debug!(
                node = %self.id,
                request = %id,
                time,
                occupancy = self.buffer.len(),
                "Request buffer full, request lost"
            );
        }
    }

    /// Answer a poll: materialise every arrival up to `time`, then return
    /// the buffer contents.
    pub fn report(&mut self, time: f64) -> &[Request] {
        self.stats.polls_received += 1;
        while self.arrivals.peek() <= time {
            let arrival = self.arrivals.advance(&mut self.generator);
            let request = self.create_request(arrival);
            self.enqueue(request, time);
        }
        self.buffer.requests()
    }

    /// Put request `request_id` on `channel` within `slot_duration`.
    ///
    /// The request departs when its slot ends. If only part of it fit,
    /// `policy` decides whether the rest is dropped or requeued.
    pub fn transmit(
        &mut self,
        request_id: RequestId,
        channel: &mut Channel,
        slot_duration: f64,
        earliest_start: f64,
        policy: FragmentPolicy,
    ) -> Result<Transmission, NodeError> {
        let mut request = self.buffer.remove(request_id).ok_or(NodeError::UnknownRequest {
            node: self.id,
            id: request_id,
        })?;

        // Nothing is booked on the channel for a rejected departure
        let planned = channel.peek_flush(&request, slot_duration, earliest_start);
        if let Err(err) = request.set_departure_time(planned.end) {
            self.buffer.requeue_front(request);
            return Err(err.into());
        }
        let outcome = channel.flush(&request, slot_duration, earliest_start);

        self.stats.responses_sent += 1;
        self.stats.data_transmitted_mb += outcome.sent_mb;

        let mut requeued = None;
        if outcome.is_fragmented() {
            match policy {
                FragmentPolicy::Drop => {
                    self.stats.fragments_dropped += 1;
                    self.stats.fragment_mb_dropped += outcome.fragment_mb;
                }
                FragmentPolicy::Requeue => {
                    let id = self.next_request_id();
                    let remainder = request.remainder_after(outcome.sent_mb, id);
                    if self.buffer.requeue_front(remainder) {
                        self.stats.fragments_requeued += 1;
                        requeued = Some(id);
                    } else {
                        self.stats.fragments_dropped += 1;
                        self.stats.fragment_mb_dropped += outcome.fragment_mb;
                    }
                }
            }
        }

        trace!(
            node = %self.id,
            request = %request_id,
            sent_mb = outcome.sent_mb,
            departure = outcome.slot.end,
            "Request transmitted"
        );

        Ok(Transmission {
            request,
            outcome,
            requeued,
        })
    }

    pub fn buffer(&self) -> &RequestBuffer {
        &self.buffer
    }

    pub fn buffer_occupancy(&self) -> f64 {
        self.buffer.utilization()
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    pub fn arrival_stats(&self) -> ArrivalStats {
        self.arrivals.stats()
    }

    pub fn stats(&self) -> CycleOnuStats {
        self.stats
    }

    /// Fraction of polls answered with a transmission, in percent.
    pub fn response_rate(&self) -> f64 {
        if self.stats.polls_received == 0 {
            return 0.0;
        }
        self.stats.responses_sent as f64 / self.stats.polls_received as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ponsim_core::LinkStats;
    use ponsim_types::{ClassMap, TrafficClass};

    fn profile() -> TrafficProfile {
        TrafficProfile::new(200.0)
    }

    #[test]
    fn test_starts_with_two_requests() {
        let node = CycleOnu::new(NodeId(1), profile(), 3).unwrap();
        assert_eq!(node.buffer().len(), 2);
        assert!(node.buffer().requests().iter().all(|r| r.created_at() == 0.0));
        assert_eq!(node.stats().requests_generated, 2);
    }

    #[test]
    fn test_report_only_materialises_past_arrivals() {
        let mut node = CycleOnu::new(NodeId(1), profile(), 3).unwrap();
        let requests = node.report(0.5);
        assert!(requests.len() > 2);
        assert!(requests.iter().all(|r| r.created_at() <= 0.5));

        // A second poll at the same time adds nothing
        let before = node.buffer().len();
        node.report(0.5);
        assert_eq!(node.buffer().len(), before);
        assert_eq!(node.stats().polls_received, 2);
    }

    #[test]
    fn test_buffer_overflow_counts_losses() {
        let profile = profile().with_buffer_capacity(4);
        let mut node = CycleOnu::new(NodeId(0), profile, 8).unwrap();
        node.report(1.0);

        assert_eq!(node.buffer().len(), 4);
        assert!(node.stats().requests_lost > 0);
        assert_eq!(node.stats().requests_lost, node.buffer_stats().dropped);
    }

    #[test]
    fn test_transmit_sets_departure_at_slot_end() {
        let mut node = CycleOnu::new(NodeId(2), profile(), 5).unwrap();
        let id = node.report(0.01)[0].id();
        let mut channel = Channel::new(1024.0).unwrap();

        let sent = node
            .transmit(id, &mut channel, 1.0, 0.02, FragmentPolicy::Drop)
            .unwrap();

        assert_eq!(sent.request.departure_time(), sent.outcome.slot.end);
        assert!(sent.request.delay() >= 0.0);
        assert!(node.buffer().get(id).is_none());
        assert_eq!(node.stats().responses_sent, 1);
    }

    #[test]
    fn test_unknown_request_is_an_error() {
        let mut node = CycleOnu::new(NodeId(2), profile(), 5).unwrap();
        let mut channel = Channel::new(1024.0).unwrap();
        let missing = RequestId::new(NodeId(2), 9_999);

        let err = node
            .transmit(missing, &mut channel, 1.0, 0.0, FragmentPolicy::Drop)
            .unwrap_err();
        assert_eq!(
            err,
            NodeError::UnknownRequest {
                node: NodeId(2),
                id: missing
            }
        );
    }

    #[test]
    fn test_rejected_departure_leaves_channel_untouched() {
        let mut node = CycleOnu::new(NodeId(3), profile(), 11).unwrap();
        let late = node
            .report(0.5)
            .iter()
            .max_by(|a, b| a.created_at().total_cmp(&b.created_at()))
            .cloned()
            .unwrap();
        assert!(late.created_at() > 0.01);
        let mut channel = Channel::new(1024.0).unwrap();

        // The slot would end long before the request was created
        let err = node
            .transmit(late.id(), &mut channel, 1.0, 0.0, FragmentPolicy::Drop)
            .unwrap_err();

        assert!(matches!(err, NodeError::Request(_)));
        assert_eq!(channel.busy_until(), 0.0);
        assert_eq!(channel.stats(), LinkStats::default());
        assert!(node.buffer().get(late.id()).is_some());
        assert_eq!(node.stats().responses_sent, 0);
        assert_eq!(node.stats().data_transmitted_mb, 0.0);
    }

    fn node_with_big_request(policy_seed: u64) -> (CycleOnu, RequestId) {
        // Every class present, each at least 50 KB
        let profile = TrafficProfile::new(1.0)
            .with_request_probabilities(ClassMap::splat(1.0))
            .with_class_sizes_mb(ClassMap::splat((0.05, 0.1)));
        let node = CycleOnu::new(NodeId(4), profile, policy_seed).unwrap();
        let id = node.buffer().requests()[0].id();
        (node, id)
    }

    #[test]
    fn test_fragment_dropped_by_default() {
        let (mut node, id) = node_with_big_request(6);
        let mut channel = Channel::new(1024.0).unwrap();

        let sent = node
            .transmit(id, &mut channel, 75e-6, 0.0, FragmentPolicy::default())
            .unwrap();

        assert!(sent.outcome.is_fragmented());
        assert!(sent.requeued.is_none());
        assert_eq!(node.buffer().len(), 1);
        assert_eq!(node.stats().fragments_dropped, 1);
        assert!((node.stats().fragment_mb_dropped - sent.outcome.fragment_mb).abs() < 1e-12);
    }

    #[test]
    fn test_fragment_requeued_at_front() {
        let (mut node, id) = node_with_big_request(6);
        let mut channel = Channel::new(1024.0).unwrap();
        let original = node.buffer().get(id).unwrap().clone();

        let sent = node
            .transmit(id, &mut channel, 75e-6, 0.0, FragmentPolicy::Requeue)
            .unwrap();

        let requeued = sent.requeued.unwrap();
        let head = &node.buffer().requests()[0];
        assert_eq!(head.id(), requeued);
        assert_eq!(head.created_at(), sent.request.created_at());
        assert!(
            (head.total_traffic_mb() + sent.outcome.sent_mb - original.total_traffic_mb()).abs()
                < 1e-9
        );
        // The sent part came out of the most urgent class
        let highest = TrafficClass::Highest;
        assert!(
            (head.traffic()[highest] - (original.traffic()[highest] - sent.outcome.sent_mb)).abs()
                < 1e-12
        );
        assert_eq!(
            head.traffic()[TrafficClass::Lowest],
            original.traffic()[TrafficClass::Lowest]
        );
        assert_eq!(node.stats().fragments_requeued, 1);
    }

    #[test]
    fn test_fragment_policy_parsing() {
        assert_eq!("requeue".parse::<FragmentPolicy>().unwrap(), FragmentPolicy::Requeue);
        assert_eq!("DROP".parse::<FragmentPolicy>().unwrap(), FragmentPolicy::Drop);
        assert!("keep".parse::<FragmentPolicy>().is_err());
        assert_eq!(FragmentPolicy::Requeue.to_string(), "requeue");
    }
}
