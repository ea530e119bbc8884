//! Latency Analyzer Library
//!
//! Joins the NIC driver trace with the user-space probe tables, derives the
//! per-stage latency intervals of every packet and renders the summary charts.

pub mod collector;
pub mod error;
pub mod exporter;
pub mod join;
pub mod loader;
pub mod render;
pub mod trace;
pub mod types;

pub use collector::SummaryCollector;
pub use error::{AnalyzerError, Result};
pub use exporter::{JsonExporter, ReportExporter};
pub use join::{InputPaths, JoinEngine, MeasurementSet};
pub use render::ChartRenderer;
pub use trace::{CountPolicy, TraceParser};
pub use types::*;
