//! Report exporters
//!
//! Writes the summary report as JSON and the joined per-packet table as CSV.

use crate::types::{JoinedPacketRecord, LatencyReport};
use anyhow::{Context, Result};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

/// Trait for report exporters
pub trait ReportExporter {
    /// Export a latency report
    ///
    /// # Arguments
    ///
    /// * `report` - Aggregated report to export
    fn export(&self, report: &LatencyReport) -> Result<()>;
}

/// JSON exporter
pub struct JsonExporter {
    output_path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    ///
    /// * `output_path` - Path to output file
    /// * `pretty` - Enable pretty-printing
    pub fn new(output_path: PathBuf, pretty: bool) -> Self {
        Self {
            output_path,
            pretty,
        }
    }
}

impl ReportExporter for JsonExporter {
    fn export(&self, report: &LatencyReport) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };

        let mut file = File::create(&self.output_path)
            .with_context(|| format!("Failed to create output file: {:?}", self.output_path))?;

        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write to output file: {:?}", self.output_path))?;

        Ok(())
    }
}

/// Write the joined per-packet table as CSV
///
/// Columns follow [`JoinedPacketRecord`]'s serialized names.
pub fn write_joined_csv(output_path: &Path, records: &[JoinedPacketRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)
        .with_context(|| format!("Failed to create output file: {:?}", output_path))?;

    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("Failed to write to output file: {:?}", output_path))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write to output file: {:?}", output_path))?;

    Ok(())
}
