//! Shared record types between the probes and the analysis tooling
//!
//! Field names follow the column names written by the probers so that the
//! records deserialize straight from their CSV output.

use serde::{Deserialize, Serialize};

use crate::constants::STAGES_PER_PACKET;

/// Probe point a packet crosses on its way from sender to receiver
///
/// Variants are declared in chronological order; sorting a packet's
/// timestamps ascending lines them up with `ProbeStage::ALL`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProbeStage {
    /// Driver enqueues the packet for transmission
    DriverTx,
    /// NIC reports transmit completion (PHC time)
    HwTx,
    /// NIC reports receive completion (PHC time)
    HwRx,
    /// Driver delivers the packet to the stack
    DriverRx,
}

impl ProbeStage {
    /// All stages, in chronological order
    pub const ALL: [ProbeStage; STAGES_PER_PACKET] = [
        ProbeStage::DriverTx,
        ProbeStage::HwTx,
        ProbeStage::HwRx,
        ProbeStage::DriverRx,
    ];

    /// Column name of the stage in the trace table
    pub fn column(self) -> &'static str {
        match self {
            ProbeStage::DriverTx => "ts_driver_tx",
            ProbeStage::HwTx => "ts_hw_tx",
            ProbeStage::HwRx => "ts_hw_rx",
            ProbeStage::DriverRx => "ts_driver_rx",
        }
    }
}

/// Per-packet kernel and NIC timestamps (nanoseconds)
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketTimestamps {
    /// Packet sequence number
    pub pkt_seq: u32,
    /// Driver enqueue on the sender
    pub ts_driver_tx: i64,
    /// NIC transmit completion
    pub ts_hw_tx: i64,
    /// NIC receive completion
    pub ts_hw_rx: i64,
    /// Driver delivery on the receiver
    pub ts_driver_rx: i64,
}

impl PacketTimestamps {
    /// Label four ascending timestamps by position
    ///
    /// The caller is responsible for sorting; labels are assigned purely by
    /// index, in `ProbeStage::ALL` order.
    pub fn from_sorted(pkt_seq: u32, sorted: [i64; STAGES_PER_PACKET]) -> Self {
        let [ts_driver_tx, ts_hw_tx, ts_hw_rx, ts_driver_rx] = sorted;
        Self {
            pkt_seq,
            ts_driver_tx,
            ts_hw_tx,
            ts_hw_rx,
            ts_driver_rx,
        }
    }

    /// Timestamp recorded at the given stage
    pub fn at(&self, stage: ProbeStage) -> i64 {
        match stage {
            ProbeStage::DriverTx => self.ts_driver_tx,
            ProbeStage::HwTx => self.ts_hw_tx,
            ProbeStage::HwRx => self.ts_hw_rx,
            ProbeStage::DriverRx => self.ts_driver_rx,
        }
    }
}

/// Row written by the TX prober
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserspaceTxRecord {
    pub pkt_seq: u32,
    pub pkt_size: u32,
    /// User-space clock right after `sendmsg` returned
    pub t_user_tx_ns: i64,
}

/// Row written by the RX prober
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserspaceRxRecord {
    pub pkt_seq: u32,
    pub pkt_size: u32,
    /// User-space clock right after `recvmsg` returned
    pub t_user_rx_ns: i64,
    /// Hardware RX stamp from the socket control message, when the prober wrote one
    #[serde(default)]
    pub t_hw_rx_ns: Option<i64>,
}

/// TX and RX user-space rows matched on `pkt_seq`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserspaceRecord {
    pub pkt_seq: u32,
    pub pkt_size_tx: u32,
    pub pkt_size_rx: u32,
    pub t_user_tx_ns: i64,
    pub t_user_rx_ns: i64,
}

impl UserspaceRecord {
    /// Combine a TX and an RX row, suffixing size and timestamp by side
    pub fn from_pair(tx: &UserspaceTxRecord, rx: &UserspaceRxRecord) -> Self {
        Self {
            pkt_seq: tx.pkt_seq,
            pkt_size_tx: tx.pkt_size,
            pkt_size_rx: rx.pkt_size,
            t_user_tx_ns: tx.t_user_tx_ns,
            t_user_rx_ns: rx.t_user_rx_ns,
        }
    }
}

/// Latency sub-interval derived from the six timestamps of a packet
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LatencyInterval {
    /// User-space send to driver enqueue
    TxKernel,
    /// Driver enqueue to NIC transmit completion
    TxNic,
    /// NIC transmit to NIC receive
    Inflight,
    /// NIC receive to driver delivery
    RxNic,
    /// Driver delivery to user-space receive
    RxKernel,
}

impl LatencyInterval {
    /// All intervals, in path order
    pub const ALL: [LatencyInterval; 5] = [
        LatencyInterval::TxKernel,
        LatencyInterval::TxNic,
        LatencyInterval::Inflight,
        LatencyInterval::RxNic,
        LatencyInterval::RxKernel,
    ];

    /// Canonical column name
    pub fn name(self) -> &'static str {
        match self {
            LatencyInterval::TxKernel => "tx_kernel_time",
            LatencyInterval::TxNic => "tx_NIC_time",
            LatencyInterval::Inflight => "inflight_time",
            LatencyInterval::RxNic => "rx_NIC_time",
            LatencyInterval::RxKernel => "rx_kernel_time",
        }
    }

    /// Human-readable label for chart legends
    pub fn label(self) -> &'static str {
        match self {
            LatencyInterval::TxKernel => "TX Kernel Time",
            LatencyInterval::TxNic => "TX NIC Time",
            LatencyInterval::Inflight => "In-flight Time",
            LatencyInterval::RxNic => "RX NIC Time",
            LatencyInterval::RxKernel => "RX Kernel Time",
        }
    }

    /// Look up an interval by its canonical column name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|interval| interval.name() == name)
    }
}

impl std::fmt::Display for LatencyInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sorted_labels_by_position() {
        let ts = PacketTimestamps::from_sorted(7, [100, 110, 200, 210]);

        assert_eq!(ts.at(ProbeStage::DriverTx), 100);
        assert_eq!(ts.at(ProbeStage::HwTx), 110);
        assert_eq!(ts.at(ProbeStage::HwRx), 200);
        assert_eq!(ts.at(ProbeStage::DriverRx), 210);
    }

    #[test]
    fn test_interval_name_lookup() {
        for interval in LatencyInterval::ALL {
            assert_eq!(LatencyInterval::from_name(interval.name()), Some(interval));
        }
        assert_eq!(LatencyInterval::from_name("tx_nic_time"), None);
    }

    #[test]
    fn test_userspace_pair_suffixes() {
        let tx = UserspaceTxRecord {
            pkt_seq: 3,
            pkt_size: 64,
            t_user_tx_ns: 90,
        };
        let rx = UserspaceRxRecord {
            pkt_seq: 3,
            pkt_size: 100,
            t_user_rx_ns: 230,
            t_hw_rx_ns: None,
        };

        let joined = UserspaceRecord::from_pair(&tx, &rx);
        assert_eq!(joined.pkt_size_tx, 64);
        assert_eq!(joined.pkt_size_rx, 100);
        assert_eq!(joined.t_user_rx_ns - joined.t_user_tx_ns, 140);
    }
}
