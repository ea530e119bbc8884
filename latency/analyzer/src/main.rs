//! NIC Timestamp Latency Report
//!
//! Reads the driver trace and the user-space probe tables of one run,
//! joins them per packet and renders the latency breakdown charts.
//!
//! ## Usage
//!
//! ```bash
//! # Default run: trace.log, ts_probe_tx.csv, ts_probe_rx.csv in the current directory
//! ./latency-report
//!
//! # Fail on packets without exactly four probe timestamps
//! ./latency-report --strict
//!
//! # Custom inputs, charts into out/, plus a JSON summary
//! ./latency-report --trace run1/trace.log --tx run1/tx.csv --rx run1/rx.csv \
//!     --output-dir out --summary out/summary.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use latency_analyzer::{
    collector::SummaryCollector,
    exporter::{write_joined_csv, JsonExporter, ReportExporter},
    join::{InputPaths, MeasurementSet},
    render::ChartRenderer,
    trace::{CountPolicy, TraceParser},
    types::LatencyReport,
};
use log::info;
use std::path::PathBuf;
use ts_probe_common::constants::{DEFAULT_RX_FILE, DEFAULT_TRACE_FILE, DEFAULT_TX_FILE, PROBE_MARKER};

/// Per-stage packet latency report from NIC timestamping probes
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Kernel trace log captured from the driver tracepoints
    #[clap(long, default_value = DEFAULT_TRACE_FILE)]
    trace: PathBuf,

    /// CSV written by the TX prober
    #[clap(long, default_value = DEFAULT_TX_FILE)]
    tx: PathBuf,

    /// CSV written by the RX prober
    #[clap(long, default_value = DEFAULT_RX_FILE)]
    rx: PathBuf,

    /// Directory receiving the chart files
    #[clap(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Substring identifying probe lines in the trace log
    #[clap(long, default_value = PROBE_MARKER)]
    marker: String,

    /// Fail on packets without exactly four probe timestamps instead of dropping them
    #[clap(long)]
    strict: bool,

    /// Write a JSON summary report to this path
    #[clap(long)]
    summary: Option<PathBuf>,

    /// Write the joined per-packet table to this CSV path
    #[clap(long)]
    joined_csv: Option<PathBuf>,

    /// Write the JSON summary without pretty-printing
    #[clap(long)]
    compact: bool,

    /// Verbose logging
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    info!("Starting latency report...");
    info!("   Trace: {:?}", args.trace);
    info!("   TX: {:?}", args.tx);
    info!("   RX: {:?}", args.rx);
    info!("   Output: {:?}", args.output_dir);

    let policy = if args.strict {
        CountPolicy::Strict
    } else {
        CountPolicy::WarnAndDrop
    };
    let parser = TraceParser::new(args.marker.clone(), policy);
    let inputs = InputPaths {
        trace: args.trace.clone(),
        tx: args.tx.clone(),
        rx: args.rx.clone(),
    };

    let set = MeasurementSet::load(&inputs, &parser)?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", args.output_dir))?;

    let renderer = ChartRenderer::new(args.output_dir.clone());
    renderer.render_boxchart(Some(&set))?;
    renderer.render_cdf(Some(&set))?;

    let report = SummaryCollector::from_set(&set).generate_report(*set.stats());

    if let Some(path) = &args.summary {
        JsonExporter::new(path.clone(), !args.compact).export(&report)?;
        info!("Summary written to {:?}", path);
    }

    if let Some(path) = &args.joined_csv {
        write_joined_csv(path, set.records())?;
        info!("Joined table written to {:?}", path);
    }

    print_summary(&report);

    Ok(())
}

fn print_summary(report: &LatencyReport) {
    info!("");
    info!("============================================");
    info!("             Summary Report");
    info!("============================================");
    info!("");
    info!("  Joined packets:      {}", report.total_packets);
    info!("  TX / RX rows:        {} / {}", report.join.tx_rows, report.join.rx_rows);
    info!("  Trace packets:       {}", report.join.trace_packets);
    info!("  Incomplete in trace: {}", report.join.incomplete_trace_packets);
    info!("  Dropped by join:     {}", report.join.dropped());
    info!("");
    info!(
        "  {:<16} {:>10} {:>10} {:>10} {:>10}",
        "interval (ns)", "p50", "p99", "mean", "<=0"
    );
    for summary in &report.intervals {
        info!(
            "  {:<16} {:>10.0} {:>10.0} {:>10.1} {:>10}",
            summary.name,
            summary.percentiles.p50,
            summary.percentiles.p99,
            summary.mean_ns,
            summary.non_positive
        );
    }
    info!("");
    info!("============================================");
}
