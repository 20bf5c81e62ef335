//! Bounded sample storage and derived performance figures.

use crate::config::ResourceLimits;
use crate::results::{EpisodeMetrics, PerformanceMetrics};
use ponsim_core::TransmissionRecord;
use ponsim_types::{bytes_to_mb, NodeId, Request};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// End-to-end delay of one delivered unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DelaySample {
    pub time: f64,
    pub node_id: NodeId,
    pub delay: f64,
}

/// Data carried by one slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputSample {
    pub time: f64,
    pub node_id: NodeId,
    pub mb: f64,
    /// `mb` over the slot duration.
    pub mb_per_sec: f64,
}

/// Delivered data averaged over one sample window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowThroughput {
    /// Start of the window.
    pub time: f64,
    pub mb_per_sec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeBufferLevel {
    pub node_id: NodeId,
    pub used_mb: f64,
    pub utilization_percent: f64,
}

/// Buffer fill of every node at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferSnapshot {
    pub time: f64,
    pub buffers: Vec<NodeBufferLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueueLengthSample {
    pub time: f64,
    pub pending_events: usize,
}

/// Counters kept by the collector about its own storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StorageStats {
    /// Times the sample cap was hit.
    pub evictions: u64,
    /// Delay and throughput samples discarded by evictions.
    pub samples_evicted: u64,
    pub snapshots_evicted: u64,
}

/// Collects delay, throughput, utilization and buffer samples for a run.
///
/// Sample stores are capped; reaching a cap evicts the oldest half. Means,
/// jitter, fairness and totals are kept as running sums and are not affected
/// by evictions. Percentiles use only the retained samples.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    max_samples: usize,
    max_snapshots: usize,
    sample_interval: f64,
    next_sample_time: f64,

    delays: VecDeque<DelaySample>,
    throughputs: VecDeque<ThroughputSample>,
    buffer_history: VecDeque<BufferSnapshot>,
    queue_history: VecDeque<QueueLengthSample>,
    window_mb: Vec<f64>,

    delay_sum: f64,
    delay_count: u64,
    last_delay: BTreeMap<NodeId, f64>,
    ipdv_sum: f64,
    ipdv_count: u64,
    utilization_sum: f64,
    utilization_count: u64,
    total_transmitted_mb: f64,
    node_mb: BTreeMap<NodeId, f64>,
    delivered: u64,
    failed: u64,

    storage: StorageStats,
}

impl MetricsCollector {
    pub fn new(limits: &ResourceLimits, sample_interval: f64) -> Self {
        Self {
            max_samples: limits.max_metric_samples,
            max_snapshots: limits.max_buffer_history,
            sample_interval,
            next_sample_time: 0.0,
            delays: VecDeque::new(),
            throughputs: VecDeque::new(),
            buffer_history: VecDeque::new(),
            queue_history: VecDeque::new(),
            window_mb: Vec::new(),
            delay_sum: 0.0,
            delay_count: 0,
            last_delay: BTreeMap::new(),
            ipdv_sum: 0.0,
            ipdv_count: 0,
            utilization_sum: 0.0,
            utilization_count: 0,
            total_transmitted_mb: 0.0,
            node_mb: BTreeMap::new(),
            delivered: 0,
            failed: 0,
            storage: StorageStats::default(),
        }
    }

    /// Record the delay of one delivered unit.
    pub fn record_delay(&mut self, time: f64, node_id: NodeId, delay: f64) {
        self.delay_sum += delay;
        self.delay_count += 1;
        if let Some(previous) = self.last_delay.insert(node_id, delay) {
            self.ipdv_sum += (delay - previous).abs();
            self.ipdv_count += 1;
        }

        if self.delays.len() >= self.max_samples {
            self.evict_samples();
        }
        self.delays.push_back(DelaySample {
            time,
            node_id,
            delay,
        });
    }

    /// Record `mb` carried for `node_id` by a slot of `slot_duration`.
    pub fn record_throughput(&mut self, time: f64, node_id: NodeId, mb: f64, slot_duration: f64) {
        self.total_transmitted_mb += mb;
        *self.node_mb.entry(node_id).or_insert(0.0) += mb;

        let window = (time.max(0.0) / self.sample_interval).floor() as usize;
        if self.window_mb.len() <= window {
            self.window_mb.resize(window + 1, 0.0);
        }
        self.window_mb[window] += mb;

        if self.throughputs.len() >= self.max_samples {
            self.evict_samples();
        }
        let mb_per_sec = if slot_duration > 0.0 {
            mb / slot_duration
        } else {
            0.0
        };
        self.throughputs.push_back(ThroughputSample {
            time,
            node_id,
            mb,
            mb_per_sec,
        });
    }

    /// Fold a completed packet grant in at its completion time.
    pub fn record_completion(&mut self, time: f64, record: &TransmissionRecord) {
        if record.is_empty() {
            self.failed += 1;
        } else {
            for packet in &record.packets {
                self.record_delay(time, packet.node_id, packet.delay_until(time));
            }
            self.delivered += record.packets.len() as u64;
            self.record_throughput(
                time,
                record.node_id,
                bytes_to_mb(record.transmitted_bytes),
                record.slot_duration,
            );
        }
        if let Some(utilization) = record.cycle_utilization {
            self.record_utilization(utilization);
        }
    }

    /// Fold in a request that left its node carrying `sent_mb`.
    pub fn record_request(&mut self, request: &Request, sent_mb: f64, slot_duration: f64) {
        let time = request.departure_time();
        if sent_mb > 0.0 {
            self.delivered += 1;
            self.record_delay(time, request.node_id(), request.delay());
            self.record_throughput(time, request.node_id(), sent_mb, slot_duration);
        } else {
            self.failed += 1;
        }
    }

    /// Per-cycle utilization of the transmission phase, in percent.
    pub fn record_utilization(&mut self, percent: f64) {
        self.utilization_sum += percent;
        self.utilization_count += 1;
    }

    /// Whether a buffer snapshot is due at `now`.
    pub fn snapshot_due(&self, now: f64) -> bool {
        now >= self.next_sample_time
    }

    /// Store a buffer snapshot and the event-queue length at `now`.
    pub fn record_snapshot(&mut self, now: f64, buffers: Vec<NodeBufferLevel>, pending_events: usize) {
        if self.buffer_history.len() >= self.max_snapshots {
            let drop = evict_half(&mut self.buffer_history);
            evict_half(&mut self.queue_history);
            self.storage.snapshots_evicted += drop as u64;
        }
        self.buffer_history.push_back(BufferSnapshot { time: now, buffers });
        self.queue_history.push_back(QueueLengthSample {
            time: now,
            pending_events,
        });
        self.next_sample_time = ((now / self.sample_interval).floor() + 1.0) * self.sample_interval;
    }

    fn evict_samples(&mut self) {
        let dropped = evict_half(&mut self.delays) + evict_half(&mut self.throughputs);
        self.storage.evictions += 1;
        self.storage.samples_evicted += dropped as u64;
        debug!(
            dropped,
            cap = self.max_samples,
            "Metric sample cap reached, evicted oldest half"
        );
    }

    pub fn delays(&self) -> &VecDeque<DelaySample> {
        &self.delays
    }

    pub fn throughputs(&self) -> &VecDeque<ThroughputSample> {
        &self.throughputs
    }

    pub fn buffer_history(&self) -> &VecDeque<BufferSnapshot> {
        &self.buffer_history
    }

    /// Units delivered with at least some data.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Grants or slots that carried nothing.
    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn total_transmitted_mb(&self) -> f64 {
        self.total_transmitted_mb
    }

    /// Megabytes delivered per node, for nodes that delivered anything.
    pub fn node_transmitted_mb(&self) -> &BTreeMap<NodeId, f64> {
        &self.node_mb
    }

    pub fn storage(&self) -> StorageStats {
        self.storage
    }

    /// Mean delay over every recorded unit.
    pub fn mean_delay(&self) -> f64 {
        if self.delay_count == 0 {
            return 0.0;
        }
        self.delay_sum / self.delay_count as f64
    }

    /// 95th percentile of the retained delay samples.
    pub fn p95_delay(&self) -> f64 {
        let mut delays: Vec<f64> = self.delays.iter().map(|s| s.delay).collect();
        percentile(&mut delays, 0.95)
    }

    /// Mean absolute difference between consecutive delays of the same node.
    pub fn jitter_ipdv_mean(&self) -> f64 {
        if self.ipdv_count == 0 {
            return 0.0;
        }
        self.ipdv_sum / self.ipdv_count as f64
    }

    /// Average of the per-cycle utilization samples.
    pub fn network_utilization(&self) -> f64 {
        if self.utilization_count == 0 {
            return 0.0;
        }
        self.utilization_sum / self.utilization_count as f64
    }

    /// Jain's index over per-node delivered megabytes; 1.0 when nobody sent.
    pub fn jain_fairness(&self) -> f64 {
        jain_index(self.node_mb.values().copied())
    }

    pub fn throughput_time_series(&self) -> Vec<WindowThroughput> {
        self.window_mb
            .iter()
            .enumerate()
            .map(|(i, mb)| WindowThroughput {
                time: i as f64 * self.sample_interval,
                mb_per_sec: mb / self.sample_interval,
            })
            .collect()
    }

    pub fn performance(&self, simulation_time: f64) -> PerformanceMetrics {
        let mean_throughput = if simulation_time > 0.0 {
            self.total_transmitted_mb / simulation_time
        } else {
            0.0
        };
        PerformanceMetrics {
            mean_delay: self.mean_delay(),
            p95_delay: self.p95_delay(),
            jitter_ipdv_mean: self.jitter_ipdv_mean(),
            mean_throughput,
            network_utilization: self.network_utilization(),
            total_capacity_served: self.total_transmitted_mb,
            jain_fairness_per_node: self.jain_fairness(),
        }
    }

    pub fn episode(&self) -> EpisodeMetrics {
        EpisodeMetrics {
            delays: self.delays.iter().copied().collect(),
            throughputs: self.throughputs.iter().copied().collect(),
            throughput_time_series: self.throughput_time_series(),
            buffer_levels_history: self.buffer_history.iter().cloned().collect(),
            event_queue_history: self.queue_history.iter().copied().collect(),
            total_transmitted_mb: self.total_transmitted_mb,
        }
    }
}

fn evict_half<T>(samples: &mut VecDeque<T>) -> usize {
    let drop = samples.len().div_ceil(2);
    samples.drain(..drop);
    drop
}

/// Linear-interpolated percentile; `q` in `[0, 1]`.
pub(crate) fn percentile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let rank = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (rank - lo as f64)
}

pub(crate) fn jain_index(values: impl Iterator<Item = f64>) -> f64 {
    let (mut sum, mut sum_sq, mut n) = (0.0, 0.0, 0usize);
    for x in values {
        sum += x;
        sum_sq += x * x;
        n += 1;
    }
    if n == 0 || sum_sq <= 0.0 {
        return 1.0;
    }
    sum * sum / (n as f64 * sum_sq)
}
