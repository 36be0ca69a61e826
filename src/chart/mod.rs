//! Chart Rendering
//!
//! Maps an ascending reading list onto four time-series line charts, one per
//! metric, each bound to its own canvas.
//!
//! [`Charts`] owns the live chart instances and enforces destroy-before-create:
//! at most one instance per canvas, no matter how often it is redrawn.
//! Drawing goes through the [`ChartBackend`] seam; [`SvgCanvas`] is the
//! built-in backend.

mod svg;

pub use svg::{render_svg, SvgCanvas};

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::model::{is_ascending, Reading};

/// The four charted metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartMetric {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
}

impl ChartMetric {
    pub const ALL: [ChartMetric; 4] = [
        ChartMetric::Temperature,
        ChartMetric::Humidity,
        ChartMetric::Pressure,
        ChartMetric::WindSpeed,
    ];

    /// Canvas this metric is drawn on
    pub fn canvas_id(&self) -> &'static str {
        match self {
            ChartMetric::Temperature => "tempChart",
            ChartMetric::Humidity => "humidityChart",
            ChartMetric::Pressure => "pressureChart",
            ChartMetric::WindSpeed => "windChart",
        }
    }

    /// Dataset label
    pub fn label(&self) -> &'static str {
        match self {
            ChartMetric::Temperature => "Temperature (°C)",
            ChartMetric::Humidity => "Humidity (%)",
            ChartMetric::Pressure => "Pressure (hPa)",
            ChartMetric::WindSpeed => "Wind Speed (m/s)",
        }
    }

    pub fn value(&self, reading: &Reading) -> f64 {
        match self {
            ChartMetric::Temperature => reading.owm_temp,
            ChartMetric::Humidity => reading.owm_humidity,
            ChartMetric::Pressure => reading.owm_pressure,
            ChartMetric::WindSpeed => reading.owm_wind_speed,
        }
    }

    pub fn from_canvas_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.canvas_id() == id)
    }
}

impl std::fmt::Display for ChartMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartMetric::Temperature => write!(f, "temperature"),
            ChartMetric::Humidity => write!(f, "humidity"),
            ChartMetric::Pressure => write!(f, "pressure"),
            ChartMetric::WindSpeed => write!(f, "wind_speed"),
        }
    }
}

/// Tick granularity of a time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hour,
}

/// Horizontal time axis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeAxis {
    pub unit: TimeUnit,
    /// Tooltip pattern, e.g. "MMM d, h:mm a"
    pub tooltip_format: &'static str,
}

impl TimeAxis {
    /// chrono equivalent of `tooltip_format`
    pub const TOOLTIP_STRFTIME: &'static str = "%b %-d, %-I:%M %p";

    pub fn hourly() -> Self {
        Self {
            unit: TimeUnit::Hour,
            tooltip_format: "MMM d, h:mm a",
        }
    }

    /// Tooltip text for a timestamp (UTC)
    pub fn tooltip(&self, timestamp: i64) -> String {
        chrono::DateTime::from_timestamp_millis(timestamp)
            .map(|dt| dt.format(Self::TOOLTIP_STRFTIME).to_string())
            .unwrap_or_default()
    }
}

/// Vertical linear axis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearAxis {
    pub begin_at_zero: bool,
}

/// One line dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub label: String,
    /// (timestamp ms, value), ascending by timestamp
    pub points: Vec<(i64, f64)>,
    pub fill: bool,
    pub tension: f64,
    pub border_width: u32,
}

/// Everything needed to draw one chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub metric: ChartMetric,
    pub canvas: &'static str,
    pub series: LineSeries,
    pub x: TimeAxis,
    pub y: LinearAxis,
    pub responsive: bool,
}

impl LineChart {
    pub fn for_metric(metric: ChartMetric, readings: &[Reading]) -> Self {
        Self {
            metric,
            canvas: metric.canvas_id(),
            series: LineSeries {
                label: metric.label().to_string(),
                points: readings
                    .iter()
                    .map(|r| (r.timestamp, metric.value(r)))
                    .collect(),
                fill: false,
                tension: 0.0,
                border_width: 2,
            },
            x: TimeAxis::hourly(),
            y: LinearAxis {
                begin_at_zero: false,
            },
            responsive: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.points.is_empty()
    }
}

/// Chart specs for all four metrics
pub fn build_charts(readings: &[Reading]) -> Vec<LineChart> {
    ChartMetric::ALL
        .into_iter()
        .map(|m| LineChart::for_metric(m, readings))
        .collect()
}

/// Identifier of a live chart instance inside a backend
pub type ChartId = u64;

/// Chart rendering errors
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Canvas not found: {0}")]
    CanvasMissing(String),

    #[error("Chart backend error: {0}")]
    Backend(String),
}

/// The charting library boundary
pub trait ChartBackend: Send {
    /// Make a canvas available for drawing
    fn show_canvas(&mut self, canvas: &str);

    /// Whether the canvas currently exists
    fn has_canvas(&self, canvas: &str) -> bool;

    /// Create a chart instance on `chart.canvas`
    fn create(&mut self, chart: &LineChart) -> Result<ChartId, ChartError>;

    /// Destroy a chart instance. Unknown ids are ignored.
    fn destroy(&mut self, id: ChartId);
}

/// Live chart instances, at most one per canvas
pub struct Charts {
    backend: Box<dyn ChartBackend>,
    live: HashMap<&'static str, ChartId>,
}

impl Charts {
    pub fn new(backend: Box<dyn ChartBackend>) -> Self {
        Self {
            backend,
            live: HashMap::new(),
        }
    }

    /// Mount all four canvases
    pub fn show_canvases(&mut self) {
        for metric in ChartMetric::ALL {
            self.backend.show_canvas(metric.canvas_id());
        }
    }

    /// Redraw all four charts from `readings` (ascending).
    ///
    /// Each canvas's previous instance is destroyed before the new one is
    /// created. Canvases that do not exist are skipped. Returns the number of
    /// charts created.
    pub fn draw(&mut self, readings: &[Reading]) -> Result<usize, ChartError> {
        debug_assert!(is_ascending(readings), "chart input must be ascending");

        let mut created = 0;
        for chart in build_charts(readings) {
            if let Some(previous) = self.live.remove(chart.canvas) {
                self.backend.destroy(previous);
            }

            if !self.backend.has_canvas(chart.canvas) {
                tracing::debug!(canvas = chart.canvas, "Canvas not present, skipping chart");
                continue;
            }

            let id = self.backend.create(&chart)?;
            self.live.insert(chart.canvas, id);
            created += 1;
        }

        tracing::debug!(points = readings.len(), charts = created, "Charts drawn");
        Ok(created)
    }

    /// Destroy every live instance. Safe to call repeatedly.
    pub fn destroy_all(&mut self) {
        for (_, id) in self.live.drain() {
            self.backend.destroy(id);
        }
    }

    /// Number of live chart instances
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl Drop for Charts {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
