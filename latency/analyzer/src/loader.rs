//! User-space probe table loading
//!
//! Reads the CSV files written by the TX and RX probers and matches their
//! rows on `pkt_seq`.

use crate::error::{AnalyzerError, Result};
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    fs::File,
    path::Path,
};
use ts_probe_common::{
    constants::{RX_REQUIRED_COLUMNS, TX_REQUIRED_COLUMNS},
    UserspaceRecord, UserspaceRxRecord, UserspaceTxRecord,
};

/// TX and RX rows matched on `pkt_seq`
#[derive(Debug, Clone, Default)]
pub struct UserspaceTable {
    /// Matched rows, in TX file order
    pub records: Vec<UserspaceRecord>,
    /// Rows read from the TX file
    pub tx_rows: usize,
    /// Rows read from the RX file
    pub rx_rows: usize,
}

/// Load the transmit-side table
pub fn load_tx(path: impl AsRef<Path>) -> Result<Vec<UserspaceTxRecord>> {
    let path = path.as_ref();
    info!("Loading TX data from {:?}", path);
    load_table(path, TX_REQUIRED_COLUMNS)
}

/// Load the receive-side table
pub fn load_rx(path: impl AsRef<Path>) -> Result<Vec<UserspaceRxRecord>> {
    let path = path.as_ref();
    info!("Loading RX data from {:?}", path);
    load_table(path, RX_REQUIRED_COLUMNS)
}

/// Load both tables and inner-join them on `pkt_seq`
pub fn load_userspace(tx_path: impl AsRef<Path>, rx_path: impl AsRef<Path>) -> Result<UserspaceTable> {
    let tx = load_tx(tx_path)?;
    let rx = load_rx(rx_path)?;
    let records = join_userspace(&tx, &rx);

    info!(
        "Matched {} user-space packets ({} TX rows, {} RX rows)",
        records.len(),
        tx.len(),
        rx.len()
    );

    Ok(UserspaceTable {
        records,
        tx_rows: tx.len(),
        rx_rows: rx.len(),
    })
}

/// Inner-join TX and RX rows on `pkt_seq`
///
/// Rows keep TX order. A repeated `pkt_seq` on either side keeps its first
/// occurrence.
pub fn join_userspace(tx: &[UserspaceTxRecord], rx: &[UserspaceRxRecord]) -> Vec<UserspaceRecord> {
    let mut rx_by_seq: HashMap<u32, &UserspaceRxRecord> = HashMap::with_capacity(rx.len());
    for record in rx {
        match rx_by_seq.entry(record.pkt_seq) {
            Entry::Occupied(_) => warn!("Duplicate RX row for packet {}; keeping the first", record.pkt_seq),
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }

    let mut seen = HashSet::with_capacity(tx.len());
    tx.iter()
        .filter(|record| {
            let first = seen.insert(record.pkt_seq);
            if !first {
                warn!("Duplicate TX row for packet {}; keeping the first", record.pkt_seq);
            }
            first
        })
        .filter_map(|record| {
            rx_by_seq
                .get(&record.pkt_seq)
                .map(|rx_record| UserspaceRecord::from_pair(record, rx_record))
        })
        .collect()
}

fn load_table<T: DeserializeOwned>(path: &Path, required: &'static [&'static str]) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|source| AnalyzerError::InputUnavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    for &column in required {
        if !headers.iter().any(|header| header == column) {
            return Err(AnalyzerError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    reader
        .deserialize::<T>()
        .map(|row| row.map_err(|e| csv_error(path, e)))
        .collect()
}

fn csv_error(path: &Path, err: csv::Error) -> AnalyzerError {
    let line = err.position().map(|pos| pos.line()).unwrap_or(0);
    AnalyzerError::malformed(path, line, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn tx(pkt_seq: u32, t_user_tx_ns: i64) -> UserspaceTxRecord {
        UserspaceTxRecord {
            pkt_seq,
            pkt_size: 100,
            t_user_tx_ns,
        }
    }

    fn rx(pkt_seq: u32, t_user_rx_ns: i64) -> UserspaceRxRecord {
        rx_with_size(pkt_seq, 100, t_user_rx_ns)
    }

    fn rx_with_size(pkt_seq: u32, pkt_size: u32, t_user_rx_ns: i64) -> UserspaceRxRecord {
        UserspaceRxRecord {
            pkt_seq,
            pkt_size,
            t_user_rx_ns,
            t_hw_rx_ns: None,
        }
    }

    #[test]
    fn test_load_tx_and_rx() {
        let dir = tempdir().unwrap();
        let tx_path = dir.path().join("ts_probe_tx.csv");
        let rx_path = dir.path().join("ts_probe_rx.csv");
        fs::write(&tx_path, "pkt_seq,pkt_size,t_user_tx_ns\n1,64,90\n2,64,190\n").unwrap();
        fs::write(
            &rx_path,
            "pkt_seq,pkt_size,t_user_rx_ns,t_hw_rx_ns\n1,64,230,215\n2,64,330,315\n",
        )
        .unwrap();

        let tx_rows = load_tx(&tx_path).unwrap();
        let rx_rows = load_rx(&rx_path).unwrap();

        assert_eq!(tx_rows.len(), 2);
        assert_eq!(
            tx_rows[1],
            UserspaceTxRecord {
                pkt_seq: 2,
                pkt_size: 64,
                t_user_tx_ns: 190,
            }
        );
        assert_eq!(rx_rows[0].t_hw_rx_ns, Some(215));
        assert_eq!(rx_rows[1].t_user_rx_ns, 330);
    }

    #[test]
    fn test_rx_without_hw_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rx.csv");
        fs::write(&path, "pkt_seq, pkt_size, t_user_rx_ns\n7, 64, 1000\n").unwrap();

        let rows = load_rx(&path).unwrap();
        assert_eq!(rows, vec![rx_with_size(7, 64, 1000)]);
    }

    #[test]
    fn test_missing_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tx.csv");
        fs::write(&path, "pkt_seq,pkt_size,t_user_ns\n1,64,90\n").unwrap();

        match load_tx(&path) {
            Err(AnalyzerError::MissingColumn { column, .. }) => assert_eq!(column, "t_user_tx_ns"),
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_row_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tx.csv");
        fs::write(&path, "pkt_seq,pkt_size,t_user_tx_ns\n1,64,90\nx,64,100\n").unwrap();

        match load_tx(&path) {
            Err(AnalyzerError::MalformedRecord { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_rx("/nonexistent/ts_probe_rx.csv").unwrap_err();
        assert!(matches!(err, AnalyzerError::InputUnavailable { .. }));
    }

    #[test]
    fn test_join_drops_unmatched() {
        let joined = join_userspace(&[tx(1, 10), tx(2, 20), tx(3, 30)], &[rx(3, 35), rx(1, 15)]);

        let seqs: Vec<u32> = joined.iter().map(|r| r.pkt_seq).collect();
        assert_eq!(seqs, vec![1, 3]);
        assert_eq!(joined[1].t_user_rx_ns, 35);
    }

    #[test]
    fn test_join_keeps_first_duplicate() {
        let joined = join_userspace(&[tx(1, 10), tx(1, 11)], &[rx(1, 15), rx(1, 16)]);

        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].t_user_tx_ns, 10);
        assert_eq!(joined[0].t_user_rx_ns, 15);
    }
}
