//! Summary statistics collection
//!
//! Aggregates the derived intervals of a measurement set into a
//! [`LatencyReport`].

use crate::{join::MeasurementSet, types::*};
use std::collections::BTreeMap;

/// Collector for per-interval latency samples
#[derive(Default)]
pub struct SummaryCollector {
    /// Samples per interval, in nanoseconds
    samples: BTreeMap<LatencyInterval, Vec<i64>>,
    /// Histogram per interval
    histograms: BTreeMap<LatencyInterval, LatencyHistogram>,
    /// Total number of packets processed
    total_packets: u64,
}

impl SummaryCollector {
    /// Create a new summary collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every record of a measurement set
    pub fn from_set(set: &MeasurementSet) -> Self {
        let mut collector = Self::new();
        for record in set.records() {
            collector.add_record(record);
        }
        collector
    }

    /// Add one joined packet to the collector
    pub fn add_record(&mut self, record: &JoinedPacketRecord) {
        for interval in LatencyInterval::ALL {
            let latency_ns = record.interval(interval);

            self.samples.entry(interval).or_default().push(latency_ns);
            self.histograms
                .entry(interval)
                .or_default()
                .add_sample(latency_ns);
        }

        self.total_packets += 1;
    }

    /// Generate the aggregated report
    ///
    /// # Arguments
    ///
    /// * `join` - Join accounting to embed in the report
    pub fn generate_report(&self, join: JoinStats) -> LatencyReport {
        let intervals = LatencyInterval::ALL
            .iter()
            .map(|interval| self.summarize(*interval))
            .collect();

        LatencyReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_packets: self.total_packets,
            join,
            intervals,
        }
    }

    fn summarize(&self, interval: LatencyInterval) -> IntervalSummary {
        let raw = self
            .samples
            .get(&interval)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let samples: Vec<f64> = raw.iter().map(|&ns| ns as f64).collect();

        let mean = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        };

        IntervalSummary {
            name: interval.name().to_string(),
            samples: raw.len() as u64,
            non_positive: raw.iter().filter(|&&ns| ns <= 0).count() as u64,
            min_ns: raw.iter().copied().min().unwrap_or(0),
            max_ns: raw.iter().copied().max().unwrap_or(0),
            mean_ns: mean,
            std_dev_ns: calculate_std_dev(&samples, mean),
            percentiles: calculate_percentiles(samples),
            histogram: self.histograms.get(&interval).cloned().unwrap_or_default(),
        }
    }

    /// Get current packet count
    pub fn packet_count(&self) -> u64 {
        self.total_packets
    }

    /// Get the histogram of one interval
    pub fn histogram(&self, interval: LatencyInterval) -> Option<&LatencyHistogram> {
        self.histograms.get(&interval)
    }
}
