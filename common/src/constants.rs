//! Shared constants for the timestamping probes
//!
//! These constants pin down the formats written by the NIC driver
//! tracepoints and the user-space probers, so parsing and emitting sides
//! agree on names and positions.

// ============================================================================
// Kernel Trace Log
// ============================================================================

/// Marker present in every tracepoint line emitted by the driver probe
pub const PROBE_MARKER: &str = "mqnic_ts_probe";

/// Number of probe points a packet crosses (driver TX, HW TX, HW RX, driver RX)
pub const STAGES_PER_PACKET: usize = 4;

/// Separator between `key=value` tokens in the trailing trace field
pub const TOKEN_SEPARATOR: char = ',';

/// Separator between key and value inside a token
pub const KEY_VALUE_SEPARATOR: char = '=';

/// Position of the packet sequence number in the token list
pub const SEQ_TOKEN_INDEX: usize = 1;

/// Position of the nanosecond timestamp in the token list
pub const TS_TOKEN_INDEX: usize = 2;

/// Keys accepted for the sequence number token
pub const SEQ_TOKEN_KEYS: &[&str] = &["pkt_seq", "seq"];

/// Keys accepted for the timestamp token
pub const TS_TOKEN_KEYS: &[&str] = &["ts", "ts_ns"];

// ============================================================================
// User-space CSV Columns
// ============================================================================

/// Join key shared by all three tables
pub const COLUMN_PKT_SEQ: &str = "pkt_seq";

/// Payload size column
pub const COLUMN_PKT_SIZE: &str = "pkt_size";

/// Transmit-side user-space timestamp column
pub const COLUMN_T_USER_TX: &str = "t_user_tx_ns";

/// Receive-side user-space timestamp column
pub const COLUMN_T_USER_RX: &str = "t_user_rx_ns";

/// Columns the TX prober must write
pub const TX_REQUIRED_COLUMNS: &[&str] = &[COLUMN_PKT_SEQ, COLUMN_PKT_SIZE, COLUMN_T_USER_TX];

/// Columns the RX prober must write
pub const RX_REQUIRED_COLUMNS: &[&str] = &[COLUMN_PKT_SEQ, COLUMN_PKT_SIZE, COLUMN_T_USER_RX];

// ============================================================================
// Default File Names
// ============================================================================

/// Default kernel trace capture
pub const DEFAULT_TRACE_FILE: &str = "trace.log";

/// Default TX prober output
pub const DEFAULT_TX_FILE: &str = "ts_probe_tx.csv";

/// Default RX prober output
pub const DEFAULT_RX_FILE: &str = "ts_probe_rx.csv";
