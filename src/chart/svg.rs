//! SVG chart backend
//!
//! Renders a [`LineChart`] to a standalone SVG document and keeps the live
//! instances in a shared canvas set, so a handle cloned before the backend
//! is boxed can still inspect what was drawn.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ChartBackend, ChartError, ChartId, ChartMetric, LineChart};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;

const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 40.0;

const HOUR_MS: i64 = 3_600_000;
const MAX_X_TICKS: i64 = 12;

fn series_color(metric: ChartMetric) -> &'static str {
    match metric {
        ChartMetric::Temperature => "#FF9800",
        ChartMetric::Humidity => "#2196F3",
        ChartMetric::Pressure => "#9C27B0",
        ChartMetric::WindSpeed => "#4CAF50",
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render one chart as an SVG document
pub fn render_svg(chart: &LineChart) -> String {
    let chart_width = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let chart_height = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let color = series_color(chart.metric);

    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" id="{}" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#,
        chart.canvas
    );
    let _ = write!(out, r##"<rect width="100%" height="100%" fill="#1f2937"/>"##);
    let _ = write!(
        out,
        r##"<text x="{MARGIN_LEFT}" y="18" fill="#e5e7eb" font-family="sans-serif" font-size="14">{}</text>"##,
        escape(&chart.series.label)
    );

    let points = &chart.series.points;
    if points.is_empty() {
        let _ = write!(
            out,
            r##"<text x="{}" y="{}" fill="#6b7280" font-family="sans-serif" font-size="16">No data</text></svg>"##,
            WIDTH / 2.0 - 30.0,
            HEIGHT / 2.0
        );
        return out;
    }

    // Y range with 10% padding; zero is not forced into view
    let mut y_min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let mut y_max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    if chart.y.begin_at_zero {
        y_min = y_min.min(0.0);
        y_max = y_max.max(0.0);
    }
    let y_range = y_max - y_min;
    let y_padding = if y_range > 0.0 { y_range * 0.1 } else { 1.0 };
    y_min -= y_padding;
    y_max += y_padding;

    let t_start = points[0].0;
    let t_end = points[points.len() - 1].0.max(t_start + 1);
    let t_span = (t_end - t_start) as f64;

    let scale_x = |t: i64| MARGIN_LEFT + ((t - t_start) as f64 / t_span) * chart_width;
    let scale_y = |v: f64| MARGIN_TOP + ((y_max - v) / (y_max - y_min)) * chart_height;

    // Horizontal grid with y labels
    for i in 0..=5 {
        let y = MARGIN_TOP + (i as f64 / 5.0) * chart_height;
        let value = y_max - (i as f64 / 5.0) * (y_max - y_min);
        let _ = write!(
            out,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{}" y2="{y:.1}" stroke="#374151" stroke-width="1"/>"##,
            WIDTH - MARGIN_RIGHT
        );
        let _ = write!(
            out,
            r##"<text x="5" y="{:.1}" fill="#9ca3af" font-family="sans-serif" font-size="12">{value:.1}</text>"##,
            y + 4.0
        );
    }

    // Hourly x ticks
    let first_hour = (t_start + HOUR_MS - 1).div_euclid(HOUR_MS) * HOUR_MS;
    let hours = (t_end - first_hour).div_euclid(HOUR_MS) + 1;
    let step = (hours + MAX_X_TICKS - 1).div_euclid(MAX_X_TICKS).max(1) * HOUR_MS;
    let mut tick = first_hour;
    while tick <= t_end {
        let label = chrono::DateTime::from_timestamp_millis(tick)
            .map(|dt| dt.format("%-I %p").to_string())
            .unwrap_or_default();
        let _ = write!(
            out,
            r##"<text x="{:.1}" y="{}" fill="#9ca3af" font-family="sans-serif" font-size="12" text-anchor="middle">{label}</text>"##,
            scale_x(tick),
            HEIGHT - 10.0
        );
        tick += step;
    }

    // Straight segments between points
    let path: Vec<String> = points
        .iter()
        .map(|(t, v)| format!("{:.1},{:.1}", scale_x(*t), scale_y(*v)))
        .collect();
    let fill = if chart.series.fill { color } else { "none" };
    let _ = write!(
        out,
        r#"<polyline points="{}" fill="{fill}" stroke="{color}" stroke-width="{}"/>"#,
        path.join(" "),
        chart.series.border_width
    );

    for (t, v) in points {
        let _ = write!(
            out,
            r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="{color}"><title>{}: {v}</title></circle>"#,
            scale_x(*t),
            scale_y(*v),
            chart.x.tooltip(*t)
        );
    }

    out.push_str("</svg>");
    out
}

struct Instance {
    chart: LineChart,
    svg: String,
}

#[derive(Default)]
struct CanvasSet {
    canvases: HashSet<String>,
    live: BTreeMap<ChartId, Instance>,
    next_id: ChartId,
    created_total: usize,
}

/// In-memory SVG canvases. Clones share the same canvas set.
#[derive(Clone, Default)]
pub struct SvgCanvas {
    inner: Arc<Mutex<CanvasSet>>,
}

impl SvgCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CanvasSet> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn find<R>(&self, metric: ChartMetric, f: impl FnOnce(&Instance) -> R) -> Option<R> {
        self.lock()
            .live
            .values()
            .find(|i| i.chart.metric == metric)
            .map(f)
    }

    /// Number of live chart instances
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Instances ever created
    pub fn created_total(&self) -> usize {
        self.lock().created_total
    }

    /// Live chart spec for a metric
    pub fn chart(&self, metric: ChartMetric) -> Option<LineChart> {
        self.find(metric, |i| i.chart.clone())
    }

    /// Rendered SVG for a metric
    pub fn svg(&self, metric: ChartMetric) -> Option<String> {
        self.find(metric, |i| i.svg.clone())
    }
}

impl ChartBackend for SvgCanvas {
    fn show_canvas(&mut self, canvas: &str) {
        self.lock().canvases.insert(canvas.to_string());
    }

    fn has_canvas(&self, canvas: &str) -> bool {
        self.lock().canvases.contains(canvas)
    }

    fn create(&mut self, chart: &LineChart) -> Result<ChartId, ChartError> {
        let mut set = self.lock();
        if !set.canvases.contains(chart.canvas) {
            return Err(ChartError::CanvasMissing(chart.canvas.to_string()));
        }
        if set.live.values().any(|i| i.chart.canvas == chart.canvas) {
            return Err(ChartError::Backend(format!(
                "Canvas is already in use: {}",
                chart.canvas
            )));
        }

        set.next_id += 1;
        let id = set.next_id;
        set.created_total += 1;
        set.live.insert(
            id,
            Instance {
                chart: chart.clone(),
                svg: render_svg(chart),
            },
        );
        Ok(id)
    }

    fn destroy(&mut self, id: ChartId) {
        self.lock().live.remove(&id);
    }
}
