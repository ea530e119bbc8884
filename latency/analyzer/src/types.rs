//! Analyzer type definitions
//!
//! Defines the joined per-packet table and the summary structures
//! produced from it.
//!
//! ## Organization
//!
//! - **Probe Types**: Records as written by the probes (from ts_probe_common)
//! - **Analyzer Types**: Joined rows, join accounting and summary statistics

use serde::{Deserialize, Serialize};

// ============================================================================
// Probe Types (from the driver tracepoints and user-space probers)
// ============================================================================

pub mod probe {
    //! Types shared with the probe tooling
    //!
    //! Re-exported from the ts-probe-common crate; field names must match
    //! the columns the probers write.

    pub use ts_probe_common::constants;
    pub use ts_probe_common::types::{
        LatencyInterval, PacketTimestamps, ProbeStage, UserspaceRecord, UserspaceRxRecord,
        UserspaceTxRecord,
    };
}

pub use probe::{LatencyInterval, PacketTimestamps, UserspaceRecord};

/// One packet with all source timestamps and the derived intervals
///
/// Serialized column names match the intervals' canonical names.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedPacketRecord {
    pub pkt_seq: u32,
    pub pkt_size_tx: u32,
    pub pkt_size_rx: u32,
    pub t_user_tx_ns: i64,
    pub t_user_rx_ns: i64,
    pub ts_driver_tx: i64,
    pub ts_hw_tx: i64,
    pub ts_hw_rx: i64,
    pub ts_driver_rx: i64,
    pub tx_kernel_time: i64,
    #[serde(rename = "tx_NIC_time")]
    pub tx_nic_time: i64,
    pub inflight_time: i64,
    #[serde(rename = "rx_NIC_time")]
    pub rx_nic_time: i64,
    pub rx_kernel_time: i64,
}

impl JoinedPacketRecord {
    /// Join a user-space row with its trace row and derive the intervals
    ///
    /// Negative intervals are kept as-is; they indicate clock skew between
    /// the host and PHC clocks, not a parse failure.
    pub fn derive(user: &UserspaceRecord, ts: &PacketTimestamps) -> Self {
        Self {
            pkt_seq: user.pkt_seq,
            pkt_size_tx: user.pkt_size_tx,
            pkt_size_rx: user.pkt_size_rx,
            t_user_tx_ns: user.t_user_tx_ns,
            t_user_rx_ns: user.t_user_rx_ns,
            ts_driver_tx: ts.ts_driver_tx,
            ts_hw_tx: ts.ts_hw_tx,
            ts_hw_rx: ts.ts_hw_rx,
            ts_driver_rx: ts.ts_driver_rx,
            tx_kernel_time: ts.ts_driver_tx - user.t_user_tx_ns,
            tx_nic_time: ts.ts_hw_tx - ts.ts_driver_tx,
            inflight_time: ts.ts_hw_rx - ts.ts_hw_tx,
            rx_nic_time: ts.ts_driver_rx - ts.ts_hw_rx,
            rx_kernel_time: user.t_user_rx_ns - ts.ts_driver_rx,
        }
    }

    /// Value of one derived interval
    pub fn interval(&self, interval: LatencyInterval) -> i64 {
        match interval {
            LatencyInterval::TxKernel => self.tx_kernel_time,
            LatencyInterval::TxNic => self.tx_nic_time,
            LatencyInterval::Inflight => self.inflight_time,
            LatencyInterval::RxNic => self.rx_nic_time,
            LatencyInterval::RxKernel => self.rx_kernel_time,
        }
    }

    /// User-space send to user-space receive
    pub fn end_to_end(&self) -> i64 {
        self.t_user_rx_ns - self.t_user_tx_ns
    }
}

/// Row accounting for the three-way join
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    /// Rows in the TX file
    pub tx_rows: usize,
    /// Rows in the RX file
    pub rx_rows: usize,
    /// TX/RX rows matched on `pkt_seq`
    pub userspace_packets: usize,
    /// Complete packets in the trace table
    pub trace_packets: usize,
    /// Trace packets dropped for an unexpected probe count
    pub incomplete_trace_packets: usize,
    /// Packets present in all three tables
    pub joined: usize,
    /// Matched user-space packets without a trace row
    pub missing_trace: usize,
    /// Trace packets without a matched user-space row
    pub missing_userspace: usize,
}

impl JoinStats {
    /// Packets left out by the final join
    pub fn dropped(&self) -> usize {
        self.missing_trace + self.missing_userspace
    }
}

/// Aggregated report for export
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LatencyReport {
    /// RFC 3339 timestamp when the report was generated
    pub timestamp: String,
    /// Number of joined packets
    pub total_packets: u64,
    /// Join accounting
    pub join: JoinStats,
    /// Per-interval statistics, in path order
    pub intervals: Vec<IntervalSummary>,
}

/// Statistics for a single latency interval
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IntervalSummary {
    /// Canonical interval name
    pub name: String,
    /// Number of samples
    pub samples: u64,
    /// Samples that are zero or negative
    pub non_positive: u64,
    /// Minimum latency in nanoseconds
    pub min_ns: i64,
    /// Maximum latency in nanoseconds
    pub max_ns: i64,
    /// Mean latency in nanoseconds
    pub mean_ns: f64,
    /// Standard deviation in nanoseconds
    pub std_dev_ns: f64,
    /// Latency percentiles in nanoseconds
    pub percentiles: Percentiles,
    /// Decade histogram
    pub histogram: LatencyHistogram,
}

/// Latency histogram buckets
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct LatencyHistogram {
    /// Below 1us, including non-positive samples
    #[serde(rename = "<1us")]
    pub bucket_under_1us: u64,
    /// 1-10us bucket
    #[serde(rename = "1-10us")]
    pub bucket_1_10us: u64,
    /// 10-100us bucket
    #[serde(rename = "10-100us")]
    pub bucket_10_100us: u64,
    /// 100us-1ms bucket
    #[serde(rename = "100us-1ms")]
    pub bucket_100us_1ms: u64,
    /// 1ms+ bucket
    #[serde(rename = "1ms+")]
    pub bucket_1ms_plus: u64,
}

impl LatencyHistogram {
    /// Add a sample to the appropriate bucket
    ///
    /// # Arguments
    ///
    /// * `latency_ns` - Latency in nanoseconds
    pub fn add_sample(&mut self, latency_ns: i64) {
        match latency_ns {
            l if l < 1_000 => self.bucket_under_1us += 1,
            l if l < 10_000 => self.bucket_1_10us += 1,
            l if l < 100_000 => self.bucket_10_100us += 1,
            l if l < 1_000_000 => self.bucket_100us_1ms += 1,
            _ => self.bucket_1ms_plus += 1,
        }
    }

    /// Get total count across all buckets
    pub fn total_count(&self) -> u64 {
        self.bucket_under_1us
            + self.bucket_1_10us
            + self.bucket_10_100us
            + self.bucket_100us_1ms
            + self.bucket_1ms_plus
    }
}

/// Latency percentiles
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Percentiles {
    /// 50th percentile (median)
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    /// 99.9th percentile
    pub p999: f64,
}

/// Calculate nearest-rank percentiles
///
/// # Arguments
///
/// * `samples` - Vector of latency values (will be sorted in place)
///
/// # Returns
///
/// Percentiles structure with p50, p75, p90, p95, p99, p999
pub fn calculate_percentiles(mut samples: Vec<f64>) -> Percentiles {
    if samples.is_empty() {
        return Percentiles::default();
    }

    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let len = samples.len();

    let per_mille = |p: usize| {
        let index = std::cmp::min((len * p / 1000).saturating_sub(1), len - 1);
        samples[index]
    };

    Percentiles {
        p50: per_mille(500),
        p75: per_mille(750),
        p90: per_mille(900),
        p95: per_mille(950),
        p99: per_mille(990),
        p999: per_mille(999),
    }
}

/// Calculate population standard deviation
///
/// # Arguments
///
/// * `samples` - Slice of values
/// * `mean` - Mean of the values
pub fn calculate_std_dev(samples: &[f64], mean: f64) -> f64 {
    if samples.len() <= 1 {
        return 0.0;
    }

    let variance: f64 = samples
        .iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    variance.sqrt()
}
