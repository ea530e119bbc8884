//! Error types for loading and joining probe records
//!
//! Loading errors are fatal to a run. [`AnalyzerError::NotLoaded`] is the one
//! condition the renderer recovers from locally.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building a measurement set
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Input file missing or unreadable
    #[error("Input unavailable: {}: {source}", .path.display())]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Trace line or CSV row that does not match the expected structure
    #[error("Malformed record in {} at line {line}: {reason}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// CSV header lacks a required column
    #[error("{}: missing required column '{column}'", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    /// Packet whose probe count differs from the number of stages (strict mode)
    #[error("Packet {pkt_seq}: collected {count} probe timestamps, expected {expected}")]
    IncompleteProbeSet {
        pkt_seq: u32,
        count: usize,
        expected: usize,
    },

    /// Rendering requested without joined data
    #[error("Measurement data not loaded. Please load data before plotting.")]
    NotLoaded,
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

impl AnalyzerError {
    /// Build a [`AnalyzerError::MalformedRecord`]
    pub fn malformed(path: impl Into<PathBuf>, line: u64, reason: impl Into<String>) -> Self {
        AnalyzerError::MalformedRecord {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}
