//! Shared types and constants for the NIC timestamping probes
//!
//! This crate describes what the probes emit: the kernel trace line format,
//! the user-space CSV schemas, the four probe stages and the five latency
//! intervals derived from them. It is shared by the analysis tooling.

pub mod constants;
pub mod types;

// Re-export commonly used types
pub use types::{
    LatencyInterval, PacketTimestamps, ProbeStage, UserspaceRecord, UserspaceRxRecord,
    UserspaceTxRecord,
};
pub use constants::*;
