//! Three-way join and interval derivation
//!
//! Combines the matched user-space rows with the trace table on `pkt_seq`
//! and derives the five latency intervals of every packet present in all
//! three inputs. Packets missing from any input are left out and counted.

use crate::{
    error::Result,
    loader::{self, UserspaceTable},
    trace::{TraceParser, TraceTable},
    types::{JoinStats, JoinedPacketRecord, LatencyInterval, PacketTimestamps},
};
use log::{debug, info, warn};
use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    path::PathBuf,
};
use ts_probe_common::constants::{DEFAULT_RX_FILE, DEFAULT_TRACE_FILE, DEFAULT_TX_FILE};

/// Number of joined rows previewed at debug level
const PREVIEW_ROWS: usize = 5;

/// Locations of the three input files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub trace: PathBuf,
    pub tx: PathBuf,
    pub rx: PathBuf,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            trace: PathBuf::from(DEFAULT_TRACE_FILE),
            tx: PathBuf::from(DEFAULT_TX_FILE),
            rx: PathBuf::from(DEFAULT_RX_FILE),
        }
    }
}

/// Joined per-packet records of one measurement run
#[derive(Debug, Clone, Default)]
pub struct MeasurementSet {
    records: Vec<JoinedPacketRecord>,
    stats: JoinStats,
}

impl MeasurementSet {
    /// Load all three inputs and join them
    pub fn load(inputs: &InputPaths, parser: &TraceParser) -> Result<Self> {
        let trace = parser.parse_file(&inputs.trace)?;
        let userspace = loader::load_userspace(&inputs.tx, &inputs.rx)?;
        Ok(JoinEngine::join(&userspace, &trace))
    }

    /// Joined rows, in TX file order
    pub fn records(&self) -> &[JoinedPacketRecord] {
        &self.records
    }

    pub fn stats(&self) -> &JoinStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One interval across all packets
    pub fn series(&self, interval: LatencyInterval) -> Vec<i64> {
        self.records
            .iter()
            .map(|record| record.interval(interval))
            .collect()
    }

    /// One interval across all packets, addressed by canonical name
    pub fn series_by_name(&self, name: &str) -> Option<Vec<i64>> {
        LatencyInterval::from_name(name).map(|interval| self.series(interval))
    }
}

/// Join & derive engine
pub struct JoinEngine;

impl JoinEngine {
    /// Inner-join user-space rows with trace rows on `pkt_seq`
    ///
    /// A `pkt_seq` repeated within either table keeps its first row.
    ///
    /// # Arguments
    ///
    /// * `userspace` - TX/RX rows already matched on `pkt_seq`
    /// * `trace` - Parsed kernel trace table
    pub fn join(userspace: &UserspaceTable, trace: &TraceTable) -> MeasurementSet {
        let mut trace_by_seq: HashMap<u32, &PacketTimestamps> =
            HashMap::with_capacity(trace.packets.len());
        for packet in &trace.packets {
            match trace_by_seq.entry(packet.pkt_seq) {
                Entry::Occupied(_) => {
                    warn!("Duplicate trace row for packet {}; keeping the first", packet.pkt_seq)
                }
                Entry::Vacant(slot) => {
                    slot.insert(packet);
                }
            }
        }

        let mut seen = HashSet::with_capacity(userspace.records.len());
        let unique: Vec<_> = userspace
            .records
            .iter()
            .filter(|user| {
                let first = seen.insert(user.pkt_seq);
                if !first {
                    warn!("Duplicate user-space row for packet {}; keeping the first", user.pkt_seq);
                }
                first
            })
            .collect();

        let records: Vec<JoinedPacketRecord> = unique
            .iter()
            .filter_map(|user| {
                trace_by_seq
                    .get(&user.pkt_seq)
                    .map(|ts| JoinedPacketRecord::derive(user, ts))
            })
            .collect();

        // both sides are unique on pkt_seq, so joined <= either count
        let joined = records.len();
        let stats = JoinStats {
            tx_rows: userspace.tx_rows,
            rx_rows: userspace.rx_rows,
            userspace_packets: unique.len(),
            trace_packets: trace_by_seq.len(),
            incomplete_trace_packets: trace.incomplete.len(),
            joined,
            missing_trace: unique.len() - joined,
            missing_userspace: trace_by_seq.len() - joined,
        };

        info!(
            "Joined {} packets ({} without trace rows, {} without user-space rows)",
            stats.joined, stats.missing_trace, stats.missing_userspace
        );
        for record in records.iter().take(PREVIEW_ROWS) {
            debug!("{:?}", record);
        }

        MeasurementSet { records, stats }
    }
}
