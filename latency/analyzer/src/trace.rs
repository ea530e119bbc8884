//! Kernel trace log parsing
//!
//! Extracts the four driver/NIC timestamps of each packet from an ftrace
//! capture. A probe line ends with a comma separated `key=value` list:
//!
//! ```text
//! <idle>-0 [003] ..s1. 812.447301: mqnic_ts_probe_tx_cpl: TX completion: qid=0,seq=17,ts_ns=1717171717
//! ```
//!
//! Timestamps are labeled by sorted position, not by probe name.

use crate::error::{AnalyzerError, Result};
use log::{debug, info, warn};
use std::{
    collections::BTreeMap,
    fmt::Display,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};
use ts_probe_common::{
    constants::{
        KEY_VALUE_SEPARATOR, PROBE_MARKER, SEQ_TOKEN_INDEX, SEQ_TOKEN_KEYS, STAGES_PER_PACKET,
        TOKEN_SEPARATOR, TS_TOKEN_INDEX, TS_TOKEN_KEYS,
    },
    PacketTimestamps, ProbeStage,
};

/// What to do with a packet whose probe count is not exactly four
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountPolicy {
    /// Log the packet and leave it out of the trace table
    #[default]
    WarnAndDrop,
    /// Fail the run
    Strict,
}

/// Packet left out of the trace table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompletePacket {
    pub pkt_seq: u32,
    /// Number of probe lines collected for the packet
    pub count: usize,
}

/// Result of parsing a trace log
#[derive(Debug, Clone, Default)]
pub struct TraceTable {
    /// One row per complete packet, ordered by `pkt_seq`
    pub packets: Vec<PacketTimestamps>,
    /// Packets dropped under [`CountPolicy::WarnAndDrop`]
    pub incomplete: Vec<IncompletePacket>,
    /// Number of probe lines consumed
    pub probe_lines: usize,
}

/// One parsed probe line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProbeLine {
    pkt_seq: u32,
    ts_ns: i64,
}

/// Trace log parser
pub struct TraceParser {
    marker: String,
    policy: CountPolicy,
}

impl Default for TraceParser {
    fn default() -> Self {
        Self::new(PROBE_MARKER, CountPolicy::default())
    }
}

impl TraceParser {
    /// Create a new parser
    ///
    /// # Arguments
    ///
    /// * `marker` - Substring identifying probe lines
    /// * `policy` - Handling of packets without exactly four probe lines
    pub fn new(marker: impl Into<String>, policy: CountPolicy) -> Self {
        Self {
            marker: marker.into(),
            policy,
        }
    }

    /// Parse a trace log from disk
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<TraceTable> {
        let path = path.as_ref();
        info!("Loading kernel trace from {:?}", path);

        let file = File::open(path).map_err(|source| AnalyzerError::InputUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

        self.parse_reader(BufReader::new(file), path)
    }

    /// Parse a trace log from any buffered reader
    ///
    /// `source` only names the input in error messages.
    pub fn parse_reader<R: BufRead>(&self, reader: R, source: &Path) -> Result<TraceTable> {
        let mut stamps: BTreeMap<u32, Vec<i64>> = BTreeMap::new();
        let mut probe_lines = 0;

        for (index, line) in reader.lines().enumerate() {
            let line_no = index as u64 + 1;
            let line = line.map_err(|source_err| AnalyzerError::InputUnavailable {
                path: source.to_path_buf(),
                source: source_err,
            })?;

            if !line.contains(self.marker.as_str()) {
                continue;
            }

            let probe = parse_probe_line(&line)
                .map_err(|reason| AnalyzerError::malformed(source, line_no, reason))?;

            stamps.entry(probe.pkt_seq).or_default().push(probe.ts_ns);
            probe_lines += 1;
        }

        self.label(stamps, probe_lines)
    }

    /// Sort each packet's stamps and assign them to stages by position
    fn label(&self, stamps: BTreeMap<u32, Vec<i64>>, probe_lines: usize) -> Result<TraceTable> {
        let mut packets = Vec::with_capacity(stamps.len());
        let mut incomplete = Vec::new();

        for (pkt_seq, mut ts) in stamps {
            ts.sort_unstable();

            match <[i64; STAGES_PER_PACKET]>::try_from(ts.as_slice()) {
                Ok(sorted) => {
                    let packet = PacketTimestamps::from_sorted(pkt_seq, sorted);
                    if log::log_enabled!(log::Level::Debug) {
                        let stages: Vec<String> = ProbeStage::ALL
                            .iter()
                            .map(|stage| format!("{}={}", stage.column(), packet.at(*stage)))
                            .collect();
                        debug!("Packet {}: {}", pkt_seq, stages.join(" "));
                    }
                    packets.push(packet);
                }
                Err(_) => {
                    let count = ts.len();
                    if self.policy == CountPolicy::Strict {
                        return Err(AnalyzerError::IncompleteProbeSet {
                            pkt_seq,
                            count,
                            expected: STAGES_PER_PACKET,
                        });
                    }
                    warn!(
                        "Packet {} has {} probe timestamps, expected {}; dropping",
                        pkt_seq, count, STAGES_PER_PACKET
                    );
                    incomplete.push(IncompletePacket { pkt_seq, count });
                }
            }
        }

        if !incomplete.is_empty() {
            warn!(
                "Dropped {} packets without exactly {} probe timestamps",
                incomplete.len(),
                STAGES_PER_PACKET
            );
        }

        info!(
            "Parsed {} probe lines into {} packets",
            probe_lines,
            packets.len()
        );

        Ok(TraceTable {
            packets,
            incomplete,
            probe_lines,
        })
    }
}

/// Split the trailing field of a probe line into `(pkt_seq, ts)`
fn parse_probe_line(line: &str) -> std::result::Result<ProbeLine, String> {
    let field = line
        .split_whitespace()
        .next_back()
        .ok_or_else(|| "empty probe line".to_string())?;

    let tokens = field
        .split(TOKEN_SEPARATOR)
        .map(parse_token)
        .collect::<std::result::Result<Vec<_>, String>>()?;

    if tokens.len() <= TS_TOKEN_INDEX {
        return Err(format!(
            "expected at least {} key=value tokens in '{}', found {}",
            TS_TOKEN_INDEX + 1,
            field,
            tokens.len()
        ));
    }

    Ok(ProbeLine {
        pkt_seq: typed_value(tokens[SEQ_TOKEN_INDEX], SEQ_TOKEN_KEYS)?,
        ts_ns: typed_value(tokens[TS_TOKEN_INDEX], TS_TOKEN_KEYS)?,
    })
}

fn parse_token(token: &str) -> std::result::Result<(&str, &str), String> {
    match token.split_once(KEY_VALUE_SEPARATOR) {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(format!("token '{}' is not of the form key=value", token)),
    }
}

fn typed_value<T>((key, value): (&str, &str), keys: &[&str]) -> std::result::Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    if !keys.contains(&key) {
        return Err(format!("unexpected key '{}', expected one of {:?}", key, keys));
    }
    value
        .parse()
        .map_err(|e| format!("invalid value '{}' for '{}': {}", value, key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn probe(name: &str, seq: u32, ts: i64) -> String {
        format!(
            "          <idle>-0       [003] ..s1.   812.447301: mqnic_ts_probe_{}: probe: qid=0,seq={},ts_ns={}\n",
            name, seq, ts
        )
    }

    fn parse(log: &str, policy: CountPolicy) -> Result<TraceTable> {
        TraceParser::new(PROBE_MARKER, policy).parse_reader(Cursor::new(log), Path::new("trace.log"))
    }

    #[test]
    fn test_unsorted_lines_labeled_ascending() {
        let log = [
            probe("rx_cpl", 1, 200),
            probe("tx_enqueue", 1, 100),
            probe("rx_deliver", 1, 210),
            probe("tx_cpl", 1, 110),
        ]
        .concat();

        let table = parse(&log, CountPolicy::Strict).unwrap();

        assert_eq!(table.probe_lines, 4);
        assert_eq!(
            table.packets,
            vec![PacketTimestamps::from_sorted(1, [100, 110, 200, 210])]
        );
    }

    #[test]
    fn test_ignores_lines_without_marker() {
        let mut log = String::from("# tracer: nop\n#\n");
        log.push_str("   sshd-811 [000] ..... 812.0: sched_switch: prev_comm=sshd,prev_pid=811\n");
        for ts in [10, 20, 30, 40] {
            log.push_str(&probe("tx_cpl", 9, ts));
        }

        let table = parse(&log, CountPolicy::WarnAndDrop).unwrap();

        assert_eq!(table.packets.len(), 1);
        assert_eq!(table.packets[0].pkt_seq, 9);
    }

    #[test]
    fn test_accepts_pkt_seq_and_ts_keys() {
        let log: String = [1, 2, 3, 4]
            .iter()
            .map(|ts| format!("mqnic_ts_probe: qid=1,pkt_seq=5,ts={}\n", ts))
            .collect();

        let table = parse(&log, CountPolicy::Strict).unwrap();
        assert_eq!(table.packets[0].ts_driver_rx, 4);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let log = format!("{}mqnic_ts_probe: qid=0,seq=1;ts_ns=5\n", probe("tx_cpl", 1, 10));

        match parse(&log, CountPolicy::WarnAndDrop) {
            Err(AnalyzerError::MalformedRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unexpected_key() {
        let log = "mqnic_ts_probe: qid=0,len=1,ts_ns=5\n";

        let err = parse(log, CountPolicy::WarnAndDrop).unwrap_err();
        assert!(err.to_string().contains("unexpected key 'len'"));
    }

    #[test]
    fn test_rejects_non_numeric_timestamp() {
        let log = "mqnic_ts_probe: qid=0,seq=1,ts_ns=soon\n";

        assert!(matches!(
            parse(log, CountPolicy::WarnAndDrop),
            Err(AnalyzerError::MalformedRecord { line: 1, .. })
        ));
    }

    #[test]
    fn test_incomplete_packet_dropped_by_default() {
        let mut log = String::new();
        for ts in [1, 2, 3, 4] {
            log.push_str(&probe("tx_cpl", 1, ts));
        }
        for ts in [5, 6, 7] {
            log.push_str(&probe("tx_cpl", 2, ts));
        }

        let table = parse(&log, CountPolicy::WarnAndDrop).unwrap();

        assert_eq!(table.packets.len(), 1);
        assert_eq!(
            table.incomplete,
            vec![IncompletePacket {
                pkt_seq: 2,
                count: 3
            }]
        );
    }

    #[test]
    fn test_incomplete_packet_fails_in_strict_mode() {
        let log: String = [1, 2, 3, 4, 5].iter().map(|ts| probe("tx_cpl", 4, *ts)).collect();

        match parse(&log, CountPolicy::Strict) {
            Err(AnalyzerError::IncompleteProbeSet { pkt_seq, count, .. }) => {
                assert_eq!(pkt_seq, 4);
                assert_eq!(count, 5);
            }
            other => panic!("expected incomplete probe set, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_input_unavailable() {
        let err = TraceParser::default()
            .parse_file("/nonexistent/trace.log")
            .unwrap_err();

        assert!(matches!(err, AnalyzerError::InputUnavailable { .. }));
        assert!(err.to_string().contains("/nonexistent/trace.log"));
    }
}
