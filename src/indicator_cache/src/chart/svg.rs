use std::{fmt::Write, fs, path::PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{ChartError, ChartRequest, ChartSink};
use crate::{
    signals::Signal,
    store::validate_ticker,
    weekday::{WeekdayRow, WeekdayStats, weekday_name},
};

const PAD_LEFT: f64 = 70.0;
const PAD_RIGHT: f64 = 20.0;
const PAD_TOP: f64 = 40.0;
const PAD_BOTTOM: f64 = 30.0;
const PANEL_GAP: f64 = 24.0;
const OVERLAY_COLORS: [&str; 6] = ["#f59e0b", "#10b981", "#8b5cf6", "#ef4444", "#06b6d4", "#ec4899"];

/// Writes `<dir>/<TICKER>_signals.svg` with three stacked panels
/// (price/EMA 3, MACD 2, RSI 2).
#[derive(Debug, Clone)]
pub struct SvgChartSink {
    dir: PathBuf,
    width: u32,
    height: u32,
}

impl SvgChartSink {
    pub fn new(dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            dir: dir.into(),
            width: width.max(200),
            height: height.max(200),
        }
    }

    pub fn path_for(&self, ticker: &str) -> Result<PathBuf, ChartError> {
        self.file_for(ticker, "signals")
    }

    fn file_for(&self, ticker: &str, kind: &str) -> Result<PathBuf, ChartError> {
        validate_ticker(ticker).map_err(|_| ChartError::InvalidTicker(ticker.to_string()))?;
        Ok(self.dir.join(format!("{ticker}_{kind}.svg")))
    }

    fn write(&self, path: PathBuf, svg: String) -> Result<PathBuf, ChartError> {
        fs::create_dir_all(&self.dir).map_err(|source| ChartError::Io {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, svg).map_err(|source| ChartError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "chart written");
        Ok(path)
    }

    /// Writes `<dir>/<TICKER>_day_analysis.svg`: fall %, rise %, and rising
    /// vs falling day counts per weekday.
    pub fn render_weekdays(&self, stats: &WeekdayStats) -> Result<PathBuf, ChartError> {
        if stats.rows.is_empty() {
            return Err(ChartError::Empty {
                ticker: stats.ticker.clone(),
            });
        }
        let path = self.file_for(&stats.ticker, "day_analysis")?;
        let svg = render_weekday_svg(stats, f64::from(self.width), f64::from(self.height));
        self.write(path, svg)
    }
}

impl ChartSink for SvgChartSink {
    type Output = PathBuf;

    fn render(&self, chart: &ChartRequest) -> Result<PathBuf, ChartError> {
        if chart.is_empty() {
            return Err(ChartError::Empty {
                ticker: chart.ticker.clone(),
            });
        }
        let path = self.path_for(&chart.ticker)?;
        let svg = render_svg(chart, f64::from(self.width), f64::from(self.height));
        self.write(path, svg)
    }
}

/// Vertical placement of one panel and its value range.
struct Panel {
    top: f64,
    height: f64,
    min: f64,
    max: f64,
}

impl Panel {
    fn new(top: f64, height: f64, values: impl Iterator<Item = f64>) -> Self {
        let (mut min, mut max) = values
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if !min.is_finite() {
            (min, max) = (0.0, 1.0);
        }
        if max - min < 1e-12 {
            min -= 1.0;
            max += 1.0;
        }
        let margin = (max - min) * 0.05;
        Self {
            top,
            height,
            min: min - margin,
            max: max + margin,
        }
    }

    fn fixed(top: f64, height: f64, min: f64, max: f64) -> Self {
        Self {
            top,
            height,
            min,
            max,
        }
    }

    fn y(&self, v: f64) -> f64 {
        self.top + self.height * (1.0 - (v - self.min) / (self.max - self.min))
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

struct Frame {
    left: f64,
    right: f64,
    n: usize,
}

impl Frame {
    fn x(&self, i: usize) -> f64 {
        let span = (self.n as f64 - 1.0).max(1.0);
        self.left + (self.right - self.left) * i as f64 / span
    }

    fn slot(&self) -> f64 {
        (self.right - self.left) / self.n.max(1) as f64
    }

    /// Middle of category `i` when the width is split into `n` equal slots.
    fn center(&self, i: usize) -> f64 {
        self.left + self.slot() * (i as f64 + 0.5)
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `M`/`L` path over the present points; a `None` breaks the line.
fn line_path(frame: &Frame, panel: &Panel, values: impl Iterator<Item = Option<f64>>) -> String {
    let mut path = String::new();
    let mut pen_down = false;
    for (i, v) in values.enumerate() {
        match v.filter(|v| v.is_finite()) {
            Some(v) => {
                let cmd = if pen_down { 'L' } else { 'M' };
                write!(path, "{cmd}{:.1},{:.1} ", frame.x(i), panel.y(v)).ok();
                pen_down = true;
            }
            None => pen_down = false,
        }
    }
    path.trim_end().to_string()
}

fn grid(svg: &mut String, frame: &Frame, panel: &Panel, label: &str) {
    for k in 0..=4 {
        let v = panel.min + (panel.max - panel.min) * f64::from(k) / 4.0;
        let y = panel.y(v);
        write!(
            svg,
            r##"<line x1="{:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#e4e4e7" stroke-dasharray="3,3"/>"##,
            frame.left, frame.right
        )
        .ok();
        write!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" fill="#71717a" font-size="10" text-anchor="end">{v:.2}</text>"##,
            frame.left - 4.0,
            y + 3.0
        )
        .ok();
    }
    write!(
        svg,
        r##"<text x="14" y="{:.1}" fill="#3f3f46" font-size="12" transform="rotate(-90 14 {:.1})" text-anchor="middle">{}</text>"##,
        panel.top + panel.height / 2.0,
        panel.top + panel.height / 2.0,
        escape(label)
    )
    .ok();
}

fn legend(svg: &mut String, frame: &Frame, panel: &Panel, entries: &[(&str, &str)]) {
    for (k, (name, color)) in entries.iter().enumerate() {
        let y = panel.top + 14.0 + 14.0 * k as f64;
        write!(
            svg,
            r##"<rect x="{:.1}" y="{:.1}" width="10" height="3" fill="{color}"/><text x="{:.1}" y="{:.1}" font-size="11" fill="#27272a">{}</text>"##,
            frame.left + 8.0,
            y - 4.0,
            frame.left + 22.0,
            y,
            escape(name)
        )
        .ok();
    }
}

/// `(index, close)` of every marked timestamp present in the chart.
fn marker_points(chart: &ChartRequest, marks: &[DateTime<Utc>]) -> Vec<(usize, f64)> {
    marks
        .iter()
        .filter_map(|ts| chart.timestamps.binary_search(ts).ok())
        .filter_map(|i| chart.close.get(i).map(|&c| (i, c)))
        .collect()
}

fn render_svg(chart: &ChartRequest, width: f64, height: f64) -> String {
    let n = chart.timestamps.len();
    let frame = Frame {
        left: PAD_LEFT,
        right: width - PAD_RIGHT,
        n,
    };
    let unit = (height - PAD_TOP - PAD_BOTTOM - 2.0 * PANEL_GAP) / 7.0;

    let price = Panel::new(
        PAD_TOP,
        unit * 3.0,
        chart
            .close
            .iter()
            .chain(chart.overlays.iter().flat_map(|o| o.values.iter()))
            .copied(),
    );
    let macd = Panel::new(
        price.bottom() + PANEL_GAP,
        unit * 2.0,
        chart
            .macd
            .macd
            .iter()
            .chain(&chart.macd.signal)
            .chain(&chart.macd.histogram)
            .copied()
            .chain(std::iter::once(0.0)),
    );
    let rsi = Panel::fixed(macd.bottom() + PANEL_GAP, unit * 2.0, 0.0, 100.0);

    let mut svg = String::with_capacity(64 * 1024 + n * 200);
    svg_open(&mut svg, width, height, &chart.title);

    // price + EMA
    grid(&mut svg, &frame, &price, "Price");
    let close_path = line_path(&frame, &price, chart.close.iter().copied().map(Some));
    write!(
        svg,
        r##"<path d="{close_path}" fill="none" stroke="#1d4ed8" stroke-width="2"/>"##
    )
    .ok();
    let mut entries = vec![("Close", "#1d4ed8")];
    for (k, overlay) in chart.overlays.iter().enumerate() {
        let color = OVERLAY_COLORS[k % OVERLAY_COLORS.len()];
        let path = line_path(&frame, &price, overlay.values.iter().copied().map(Some));
        write!(
            svg,
            r##"<path d="{path}" fill="none" stroke="{color}" stroke-width="1.2"/>"##
        )
        .ok();
        entries.push((overlay.name.as_str(), color));
    }
    for (i, close) in marker_points(chart, &chart.bullish) {
        let (x, y) = (frame.x(i), price.y(close));
        write!(
            svg,
            r##"<path d="M{x:.1},{:.1} L{:.1},{:.1} L{:.1},{:.1} Z" fill="#16a34a"><title>Bullish EMA cross</title></path>"##,
            y - 7.0,
            x - 6.0,
            y + 5.0,
            x + 6.0,
            y + 5.0
        )
        .ok();
    }
    for (i, close) in marker_points(chart, &chart.bearish) {
        let (x, y) = (frame.x(i), price.y(close));
        write!(
            svg,
            r##"<path d="M{x:.1},{:.1} L{:.1},{:.1} L{:.1},{:.1} Z" fill="#dc2626"><title>Bearish EMA cross</title></path>"##,
            y + 7.0,
            x - 6.0,
            y - 5.0,
            x + 6.0,
            y - 5.0
        )
        .ok();
    }
    legend(&mut svg, &frame, &price, &entries);
    let signal_color = match chart.signal {
        Signal::Bullish => "#16a34a",
        Signal::Bearish => "#dc2626",
        Signal::Neutral => "#52525b",
    };
    write!(
        svg,
        r##"<text x="{:.1}" y="{:.1}" font-size="13" font-weight="bold" text-anchor="end" fill="{signal_color}">Signal: {}</text>"##,
        frame.right - 6.0,
        price.top + 16.0,
        chart.signal
    )
    .ok();

    // MACD
    grid(&mut svg, &frame, &macd, "MACD");
    let zero = macd.y(0.0);
    let bar_w = (frame.slot() * 0.8).max(0.5);
    for (i, &h) in chart.macd.histogram.iter().enumerate() {
        if !h.is_finite() {
            continue;
        }
        let y = macd.y(h);
        let color = if h >= 0.0 { "#22c55e" } else { "#ef4444" };
        write!(
            svg,
            r##"<rect x="{:.1}" y="{:.1}" width="{bar_w:.2}" height="{:.1}" fill="{color}" fill-opacity="0.4"/>"##,
            frame.x(i) - bar_w / 2.0,
            y.min(zero),
            (y - zero).abs()
        )
        .ok();
    }
    write!(
        svg,
        r##"<line x1="{:.1}" y1="{zero:.1}" x2="{:.1}" y2="{zero:.1}" stroke="#52525b"/>"##,
        frame.left, frame.right
    )
    .ok();
    let macd_path = line_path(&frame, &macd, chart.macd.macd.iter().copied().map(Some));
    let signal_path = line_path(&frame, &macd, chart.macd.signal.iter().copied().map(Some));
    write!(
        svg,
        r##"<path d="{macd_path}" fill="none" stroke="#2563eb" stroke-width="1.2"/><path d="{signal_path}" fill="none" stroke="#f97316" stroke-width="1.2"/>"##
    )
    .ok();
    legend(&mut svg, &frame, &macd, &[("MACD", "#2563eb"), ("Signal", "#f97316")]);

    // RSI
    grid(&mut svg, &frame, &rsi, &chart.rsi_label);
    for level in [70.0, 30.0] {
        let y = rsi.y(level);
        write!(
            svg,
            r##"<line x1="{:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#a1a1aa" stroke-dasharray="6,4"/>"##,
            frame.left, frame.right
        )
        .ok();
    }
    let rsi_path = line_path(&frame, &rsi, chart.rsi.iter().copied());
    write!(
        svg,
        r##"<path d="{rsi_path}" fill="none" stroke="#7c3aed" stroke-width="1.2"/>"##
    )
    .ok();

    // date axis
    let ticks = n.min(6);
    for k in 0..ticks {
        let i = if ticks > 1 { k * (n - 1) / (ticks - 1) } else { 0 };
        write!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" font-size="10" fill="#71717a" text-anchor="middle">{}</text>"##,
            frame.x(i),
            rsi.bottom() + 16.0,
            chart.timestamps[i].format("%Y-%m-%d")
        )
        .ok();
    }

    svg.push_str("</svg>\n");
    svg
}

fn svg_open(svg: &mut String, width: f64, height: f64, title: &str) {
    write!(
        svg,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"##,
        w = width,
        h = height
    )
    .ok();
    write!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##).ok();
    write!(
        svg,
        r##"<text x="{:.1}" y="24" font-size="16" font-weight="bold" text-anchor="middle" fill="#18181b">{}</text>"##,
        width / 2.0,
        escape(title)
    )
    .ok();
}

/// Vertical bar from the panel floor up to `value`.
fn column(svg: &mut String, panel: &Panel, x: f64, width: f64, value: f64, color: &str) {
    let floor = panel.y(panel.min.max(0.0));
    let top = panel.y(value);
    write!(
        svg,
        r##"<rect x="{:.1}" y="{:.1}" width="{width:.1}" height="{:.1}" fill="{color}"/>"##,
        x - width / 2.0,
        top.min(floor),
        (floor - top).abs()
    )
    .ok();
}

fn column_label(svg: &mut String, panel: &Panel, x: f64, value: f64, text: &str) {
    write!(
        svg,
        r##"<text x="{x:.1}" y="{:.1}" font-size="10" fill="#27272a" text-anchor="middle">{}</text>"##,
        panel.y(value) - 4.0,
        escape(text)
    )
    .ok();
}

fn render_weekday_svg(stats: &WeekdayStats, width: f64, height: f64) -> String {
    let n = stats.rows.len();
    let frame = Frame {
        left: PAD_LEFT,
        right: width - PAD_RIGHT,
        n,
    };
    let unit = (height - PAD_TOP - PAD_BOTTOM - 2.0 * PANEL_GAP) / 3.0;
    let max_pct = |pct: fn(&WeekdayRow) -> f64| {
        stats.rows.iter().map(pct).fold(0.0, f64::max).max(1.0) * 1.15
    };
    let fall = Panel::fixed(PAD_TOP, unit, 0.0, max_pct(WeekdayRow::fall_pct));
    let rise = Panel::fixed(fall.bottom() + PANEL_GAP, unit, 0.0, max_pct(WeekdayRow::rise_pct));
    let most = stats
        .rows
        .iter()
        .map(|r| r.rising.max(r.falling))
        .max()
        .unwrap_or(0);
    let counts = Panel::fixed(
        rise.bottom() + PANEL_GAP,
        unit,
        0.0,
        (most as f64 * 1.15).max(1.0),
    );

    let mut svg = String::with_capacity(16 * 1024);
    svg_open(&mut svg, width, height, &format!("{} - Day of Week Analysis", stats.ticker));
    let bar_w = frame.slot() * 0.6;

    grid(&mut svg, &frame, &fall, "Fall %");
    for (i, row) in stats.rows.iter().enumerate() {
        let x = frame.center(i);
        column(&mut svg, &fall, x, bar_w, row.fall_pct(), "#f87171");
        column_label(&mut svg, &fall, x, row.fall_pct(), &format!("{:.1}%", row.fall_pct()));
    }

    grid(&mut svg, &frame, &rise, "Rise %");
    for (i, row) in stats.rows.iter().enumerate() {
        let x = frame.center(i);
        column(&mut svg, &rise, x, bar_w, row.rise_pct(), "#4ade80");
        column_label(&mut svg, &rise, x, row.rise_pct(), &format!("{:.1}%", row.rise_pct()));
    }

    grid(&mut svg, &frame, &counts, "Days");
    let half = bar_w / 2.0;
    for (i, row) in stats.rows.iter().enumerate() {
        let x = frame.center(i);
        column(&mut svg, &counts, x - half / 2.0, half, row.rising as f64, "#16a34a");
        column(&mut svg, &counts, x + half / 2.0, half, row.falling as f64, "#dc2626");
    }
    legend(&mut svg, &frame, &counts, &[("Rising", "#16a34a"), ("Falling", "#dc2626")]);

    for (i, row) in stats.rows.iter().enumerate() {
        write!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" font-size="11" fill="#3f3f46" text-anchor="middle">{}</text>"##,
            frame.center(i),
            counts.bottom() + 16.0,
            weekday_name(row.weekday)
        )
        .ok();
    }

    svg.push_str("</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{chart::Overlay, indicators::Macd};

    fn request(n: usize) -> ChartRequest {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps: Vec<_> = (0..n).map(|i| t0 + Duration::days(i as i64)).collect();
        let close: Vec<f64> = (0..n).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        ChartRequest {
            ticker: "SPY".into(),
            title: "SPY - Price, EMA & Signals".into(),
            timestamps: timestamps.clone(),
            close: close.clone(),
            overlays: vec![Overlay {
                name: "EMA 12".into(),
                values: close.clone(),
            }],
            macd: Macd {
                macd: vec![0.5; n],
                signal: vec![0.25; n],
                histogram: vec![0.25; n],
            },
            rsi_label: "RSI 14".into(),
            rsi: (0..n).map(|i| (i > 0).then_some(55.0)).collect(),
            bullish: timestamps.get(3).copied().into_iter().collect(),
            bearish: vec![],
            signal: Signal::Bullish,
        }
    }

    #[test]
    fn writes_named_svg_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SvgChartSink::new(dir.path().join("signals"), 1200, 900);

        let path = sink.render(&request(30)).unwrap();

        assert_eq!(path, dir.path().join("signals").join("SPY_signals.svg"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("<svg"));
        assert!(text.trim_end().ends_with("</svg>"));
        assert!(text.contains("Price, EMA &amp; Signals"));
        assert!(text.contains("Signal: Bullish"));
        assert!(text.contains("Bullish EMA cross"));
        assert!(!text.contains("NaN"));
    }

    #[test]
    fn empty_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SvgChartSink::new(dir.path(), 800, 600);
        let err = sink.render(&request(0)).unwrap_err();
        assert!(matches!(err, ChartError::Empty { .. }));
    }

    #[test]
    fn single_point_renders() {
        let svg = render_svg(&request(1), 800.0, 600.0);
        assert!(!svg.contains("NaN"));
        assert!(!svg.contains("inf"));
    }

    fn weekday_stats_for(ticker: &str) -> WeekdayStats {
        WeekdayStats {
            ticker: ticker.into(),
            rows: vec![
                WeekdayRow {
                    weekday: chrono::Weekday::Mon,
                    total: 10,
                    rising: 6,
                    falling: 4,
                },
                WeekdayRow {
                    weekday: chrono::Weekday::Tue,
                    total: 10,
                    rising: 3,
                    falling: 7,
                },
            ],
        }
    }

    #[test]
    fn writes_weekday_analysis_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SvgChartSink::new(dir.path(), 900, 700);

        let path = sink.render_weekdays(&weekday_stats_for("SPY")).unwrap();

        assert_eq!(path, dir.path().join("SPY_day_analysis.svg"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("SPY - Day of Week Analysis"));
        assert!(text.contains("Monday"));
        assert!(text.contains("70.0%"));
        assert!(text.contains("Rising"));
        assert!(!text.contains("NaN"));
    }

    #[test]
    fn weekday_chart_needs_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SvgChartSink::new(dir.path(), 900, 700);
        let empty = WeekdayStats {
            ticker: "SPY".into(),
            rows: vec![],
        };
        assert!(matches!(
            sink.render_weekdays(&empty),
            Err(ChartError::Empty { .. })
        ));
    }

    #[test]
    fn line_path_breaks_on_gaps() {
        let frame = Frame {
            left: 0.0,
            right: 30.0,
            n: 4,
        };
        let panel = Panel::fixed(0.0, 100.0, 0.0, 100.0);
        let path = line_path(&frame, &panel, [Some(50.0), None, Some(50.0), Some(0.0)].into_iter());
        assert_eq!(path, "M0.0,50.0 M20.0,50.0 L30.0,100.0");
    }
}
