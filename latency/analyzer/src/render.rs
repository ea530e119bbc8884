//! Chart rendering
//!
//! Draws the per-stage box chart and the CDF comparison chart as SVG
//! documents. Both entry points take the measurement set as an `Option`;
//! without joined data they log an error and write nothing.

use crate::{error::AnalyzerError, join::MeasurementSet, types::LatencyInterval};
use anyhow::{Context, Result};
use log::{error, info, warn};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// Box chart file name, relative to the output directory
pub const BOXCHART_FILE: &str = "latency_boxchart.svg";

/// CDF chart file name, relative to the output directory
pub const CDF_FILE: &str = "latency_cdf.svg";

const BOXCHART_SIZE: (u32, u32) = (640, 520);
const CDF_SIZE: (u32, u32) = (1000, 400);

/// Box and whisker-cap half widths, in category units
const BOX_HALF_WIDTH: f64 = 0.3;
const CAP_HALF_WIDTH: f64 = 0.15;

/// Whisker reach, in interquartile ranges beyond the box
const WHISKER_IQR: f64 = 1.5;

/// Intervals overlaid on the log-scale CDF panel
const NIC_KERNEL_INTERVALS: [LatencyInterval; 4] = [
    LatencyInterval::TxNic,
    LatencyInterval::RxNic,
    LatencyInterval::TxKernel,
    LatencyInterval::RxKernel,
];

/// Renders the latency charts of a measurement set
pub struct ChartRenderer {
    output_dir: PathBuf,
}

impl ChartRenderer {
    /// Create a new renderer
    ///
    /// # Arguments
    ///
    /// * `output_dir` - Directory receiving the chart files
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn boxchart_path(&self) -> PathBuf {
        self.output_dir.join(BOXCHART_FILE)
    }

    pub fn cdf_path(&self) -> PathBuf {
        self.output_dir.join(CDF_FILE)
    }

    /// Render one box per latency interval on a shared log-scale axis
    ///
    /// # Returns
    ///
    /// Path of the written chart, or `None` when no data was loaded
    pub fn render_boxchart(&self, set: Option<&MeasurementSet>) -> Result<Option<PathBuf>> {
        let set = match require_loaded(set) {
            Ok(set) => set,
            Err(e) => {
                error!("{}", e);
                return Ok(None);
            }
        };

        let path = self.boxchart_path();
        draw_boxchart(&path, set)
            .with_context(|| format!("Failed to render box chart: {:?}", path))?;
        info!("Box chart written to {:?}", path);

        Ok(Some(path))
    }

    /// Render the in-flight CDF next to the NIC and kernel CDFs
    ///
    /// # Returns
    ///
    /// Path of the written chart, or `None` when no data was loaded
    pub fn render_cdf(&self, set: Option<&MeasurementSet>) -> Result<Option<PathBuf>> {
        let set = match require_loaded(set) {
            Ok(set) => set,
            Err(e) => {
                error!("{}", e);
                return Ok(None);
            }
        };

        let path = self.cdf_path();
        draw_cdf(&path, set).with_context(|| format!("Failed to render CDF chart: {:?}", path))?;
        info!("CDF chart written to {:?}", path);

        Ok(Some(path))
    }
}

fn require_loaded(set: Option<&MeasurementSet>) -> std::result::Result<&MeasurementSet, AnalyzerError> {
    match set {
        Some(set) if !set.is_empty() => Ok(set),
        _ => Err(AnalyzerError::NotLoaded),
    }
}

fn draw_boxchart(path: &Path, set: &MeasurementSet) -> Result<()> {
    let labels: Vec<&str> = LatencyInterval::ALL.iter().map(|i| i.name()).collect();

    let mut boxes = Vec::with_capacity(labels.len());
    let mut bounds = Bounds::default();
    for (index, interval) in LatencyInterval::ALL.iter().enumerate() {
        let values = positive_samples(&set.series(*interval), *interval);
        let Some(stats) = BoxStats::from_samples(&values) else {
            warn!("No positive {} samples; leaving its box out", interval);
            continue;
        };
        values.iter().for_each(|v| bounds.add(*v));
        boxes.push((index, stats));
    }
    let (y_lo, y_hi) = bounds.log_range();

    let root = SVGBackend::new(path, BOXCHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Latency Breakdown Boxchart", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(110)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(labels.len() as f64 - 0.5), (y_lo..y_hi).log_scale())?;

    let category_label = |v: &f64| {
        let index = v.round();
        if (v - index).abs() > 1e-6 || index < 0.0 {
            return String::new();
        }
        labels
            .get(index as usize)
            .map(|name| name.to_string())
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len())
        .x_desc("Category")
        .y_desc("Latency (ns)")
        .x_label_style(("sans-serif", 12).into_font().transform(FontTransform::Rotate90))
        .x_label_formatter(&category_label)
        .y_label_formatter(&|v: &f64| format!("{:.0e}", v))
        .draw()?;

    for (index, stats) in &boxes {
        let x = *index as f64;
        let color = Palette99::pick(*index).to_rgba();
        let line = color.stroke_width(2);
        let (left, right) = (x - BOX_HALF_WIDTH, x + BOX_HALF_WIDTH);

        chart.draw_series([
            Rectangle::new([(left, stats.q3), (right, stats.q1)], color.mix(0.3).filled()),
            Rectangle::new([(left, stats.q3), (right, stats.q1)], line),
        ])?;
        chart.draw_series([
            PathElement::new(vec![(left, stats.median), (right, stats.median)], line),
            PathElement::new(vec![(x, stats.q3), (x, stats.whisker_hi)], line),
            PathElement::new(vec![(x, stats.q1), (x, stats.whisker_lo)], line),
            PathElement::new(
                vec![(x - CAP_HALF_WIDTH, stats.whisker_hi), (x + CAP_HALF_WIDTH, stats.whisker_hi)],
                line,
            ),
            PathElement::new(
                vec![(x - CAP_HALF_WIDTH, stats.whisker_lo), (x + CAP_HALF_WIDTH, stats.whisker_lo)],
                line,
            ),
        ])?;
        chart.draw_series(
            stats
                .outliers
                .iter()
                .map(|v| Circle::new((x, *v), 3, color.stroke_width(1))),
        )?;
    }

    root.present()?;
    Ok(())
}

fn draw_cdf(path: &Path, set: &MeasurementSet) -> Result<()> {
    let root = SVGBackend::new(path, CDF_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    // Left: in-flight time on a linear axis
    let inflight: Vec<f64> = set
        .series(LatencyInterval::Inflight)
        .into_iter()
        .map(|ns| ns as f64)
        .collect();
    let mut bounds = Bounds::default();
    inflight.iter().for_each(|v| bounds.add(*v));
    let (x_lo, x_hi) = bounds.linear_range();

    let mut chart = ChartBuilder::on(&panels[0])
        .caption("In-flight Time CDF", ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_lo..x_hi, 0f64..1f64)?;
    chart
        .configure_mesh()
        .x_desc("Time (ns)")
        .y_desc("CDF")
        .draw()?;
    chart
        .draw_series(LineSeries::new(empirical_cdf(&inflight), &BLUE))?
        .label(LatencyInterval::Inflight.label())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    // Right: NIC and kernel times on a log axis
    let mut bounds = Bounds::default();
    let curves: Vec<(usize, LatencyInterval, Vec<(f64, f64)>)> = NIC_KERNEL_INTERVALS
        .iter()
        .enumerate()
        .filter_map(|(index, interval)| {
            let values = positive_samples(&set.series(*interval), *interval);
            if values.is_empty() {
                warn!("No positive {} samples; leaving its CDF out", interval);
                return None;
            }
            values.iter().for_each(|v| bounds.add(*v));
            Some((index, *interval, empirical_cdf(&values)))
        })
        .collect();
    let (x_lo, x_hi) = bounds.log_range();

    let mut chart = ChartBuilder::on(&panels[1])
        .caption("NIC and Kernel Time CDF", ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((x_lo..x_hi).log_scale(), 0f64..1f64)?;
    chart
        .configure_mesh()
        .x_desc("Time (ns)")
        .y_desc("CDF")
        .x_label_formatter(&|v: &f64| format!("{:.0e}", v))
        .draw()?;
    for (index, interval, points) in curves {
        let color = Palette99::pick(index).to_rgba();
        chart
            .draw_series(LineSeries::new(points, color))?
            .label(interval.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Samples that can be placed on a log axis
fn positive_samples(series: &[i64], interval: LatencyInterval) -> Vec<f64> {
    let values: Vec<f64> = series
        .iter()
        .filter(|&&ns| ns > 0)
        .map(|&ns| ns as f64)
        .collect();

    let skipped = series.len() - values.len();
    if skipped > 0 {
        warn!(
            "{}: {} non-positive samples cannot be shown on a log axis",
            interval, skipped
        );
    }
    values
}

/// Step points of the empirical CDF of `values`
pub fn empirical_cdf(values: &[f64]) -> Vec<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let mut points = Vec::with_capacity(sorted.len() * 2);
    for (i, x) in sorted.iter().enumerate() {
        points.push((*x, i as f64 / n));
        points.push((*x, (i + 1) as f64 / n));
    }
    points
}

/// Box-and-whisker summary of one sample set
///
/// Quartiles interpolate linearly between order statistics. Each whisker
/// ends at the most extreme sample within 1.5 IQR of the box; samples past
/// that are outliers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_lo: f64,
    pub whisker_hi: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    /// Summarize `values`, or `None` when there are none
    pub fn from_samples(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);
        let reach = WHISKER_IQR * (q3 - q1);
        let (lo_fence, hi_fence) = (q1 - reach, q3 + reach);

        // the quartiles lie inside the fences, so both searches find a sample
        let whisker_lo = sorted.iter().copied().find(|v| *v >= lo_fence).unwrap_or(q1);
        let whisker_hi = sorted.iter().rev().copied().find(|v| *v <= hi_fence).unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < whisker_lo || *v > whisker_hi)
            .collect();

        Some(Self {
            q1,
            median,
            q3,
            whisker_lo,
            whisker_hi,
            outliers,
        })
    }
}

/// Linearly interpolated quantile of ascending `sorted`
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let below = pos.floor() as usize;
    let above = pos.ceil() as usize;
    sorted[below] + (sorted[above] - sorted[below]) * (pos - below as f64)
}

/// Running min/max of plotted values
struct Bounds {
    lo: f64,
    hi: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            lo: f64::INFINITY,
            hi: f64::NEG_INFINITY,
        }
    }
}

impl Bounds {
    fn add(&mut self, value: f64) {
        self.lo = self.lo.min(value);
        self.hi = self.hi.max(value);
    }

    fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    /// Padded range for a linear axis
    fn linear_range(&self) -> (f64, f64) {
        if self.is_empty() {
            return (0.0, 1.0);
        }
        let pad = ((self.hi - self.lo) * 0.05).max(1.0);
        (self.lo - pad, self.hi + pad)
    }

    /// Padded range for a log axis; only positive values reach here
    fn log_range(&self) -> (f64, f64) {
        if self.is_empty() {
            return (1.0, 10.0);
        }
        (self.lo / 2.0, self.hi * 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        join::JoinEngine,
        loader::UserspaceTable,
        trace::TraceTable,
        types::PacketTimestamps,
    };
    use tempfile::tempdir;
    use ts_probe_common::UserspaceRecord;

    fn sample_set() -> MeasurementSet {
        let records: Vec<UserspaceRecord> = (0..20)
            .map(|i| UserspaceRecord {
                pkt_seq: i,
                pkt_size_tx: 100,
                pkt_size_rx: 100,
                t_user_tx_ns: i as i64 * 10_000,
                t_user_rx_ns: i as i64 * 10_000 + 9_000,
            })
            .collect();
        let packets = (0..20)
            .map(|i| {
                let base = i as i64 * 10_000;
                // packet 0 has the driver stamp before the user-space send
                let driver_tx = if i == 0 { base - 50 } else { base + 1_500 };
                PacketTimestamps::from_sorted(
                    i,
                    [driver_tx, base + 2_000 + i as i64, base + 6_000, base + 6_800],
                )
            })
            .collect();

        JoinEngine::join(
            &UserspaceTable {
                tx_rows: 20,
                rx_rows: 20,
                records,
            },
            &TraceTable {
                packets,
                incomplete: Vec::new(),
                probe_lines: 80,
            },
        )
    }

    #[test]
    fn test_render_without_data_writes_nothing() {
        let dir = tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path());

        assert_eq!(renderer.render_boxchart(None).unwrap(), None);
        assert_eq!(renderer.render_cdf(None).unwrap(), None);
        assert!(!renderer.boxchart_path().exists());
        assert!(!renderer.cdf_path().exists());
    }

    #[test]
    fn test_render_empty_set_writes_nothing() {
        let dir = tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path());
        let empty = MeasurementSet::default();

        assert_eq!(renderer.render_boxchart(Some(&empty)).unwrap(), None);
        assert_eq!(renderer.render_cdf(Some(&empty)).unwrap(), None);
        assert!(!renderer.boxchart_path().exists());
    }

    #[test]
    fn test_render_writes_svg_documents() {
        let dir = tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path());
        let set = sample_set();

        let boxchart = renderer.render_boxchart(Some(&set)).unwrap().unwrap();
        let cdf = renderer.render_cdf(Some(&set)).unwrap().unwrap();

        assert_eq!(boxchart, dir.path().join(BOXCHART_FILE));
        assert_eq!(cdf, dir.path().join(CDF_FILE));
        for path in [boxchart, cdf] {
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(content.contains("<svg"));
        }
    }

    #[test]
    fn test_boxchart_draws_outliers() {
        let dir = tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path());

        // packet 0's tx_NIC_time (2050 ns) sits far above the other 19
        let path = renderer.render_boxchart(Some(&sample_set())).unwrap().unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("<circle"));
    }

    #[test]
    fn test_box_stats_whiskers_end_on_samples() {
        let values = [100.0, 200.0, 5000.0, 10000.0];
        let stats = BoxStats::from_samples(&values).unwrap();

        assert_eq!(stats.q1, 175.0);
        assert_eq!(stats.median, 2600.0);
        assert_eq!(stats.q3, 6250.0);
        assert_eq!(stats.whisker_lo, 100.0);
        assert_eq!(stats.whisker_hi, 10000.0);
        assert!(values.contains(&stats.whisker_lo));
        assert!(values.contains(&stats.whisker_hi));
        assert!(stats.outliers.is_empty());
    }

    #[test]
    fn test_box_stats_outliers() {
        let stats = BoxStats::from_samples(&[10.0, 11.0, 12.0, 13.0, 14.0, 1000.0]).unwrap();

        assert_eq!(stats.q1, 11.25);
        assert_eq!(stats.q3, 13.75);
        assert_eq!(stats.whisker_lo, 10.0);
        assert_eq!(stats.whisker_hi, 14.0);
        assert_eq!(stats.outliers, vec![1000.0]);
    }

    #[test]
    fn test_box_stats_single_sample() {
        let stats = BoxStats::from_samples(&[42.0]).unwrap();

        assert_eq!((stats.whisker_lo, stats.median, stats.whisker_hi), (42.0, 42.0, 42.0));
        assert!(BoxStats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_render_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let renderer = ChartRenderer::new(dir.path());
        std::fs::write(renderer.cdf_path(), "stale").unwrap();

        renderer.render_cdf(Some(&sample_set())).unwrap();

        let content = std::fs::read_to_string(renderer.cdf_path()).unwrap();
        assert!(!content.starts_with("stale"));
    }

    #[test]
    fn test_empirical_cdf_steps() {
        let points = empirical_cdf(&[30.0, 10.0, 20.0]);

        assert_eq!(points.len(), 6);
        assert_eq!(points[0], (10.0, 0.0));
        assert_eq!(points[1].0, 10.0);
        assert!((points[1].1 - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(points[5], (30.0, 1.0));
        assert!(empirical_cdf(&[]).is_empty());
    }

    #[test]
    fn test_positive_samples_filters_non_positive() {
        let values = positive_samples(&[-5, 0, 7, 12], LatencyInterval::TxKernel);
        assert_eq!(values, vec![7.0, 12.0]);
    }

    #[test]
    fn test_bounds_ranges() {
        assert_eq!(Bounds::default().log_range(), (1.0, 10.0));

        let mut bounds = Bounds::default();
        bounds.add(100.0);
        assert_eq!(bounds.linear_range(), (99.0, 101.0));
        assert_eq!(bounds.log_range(), (50.0, 200.0));
    }
}
