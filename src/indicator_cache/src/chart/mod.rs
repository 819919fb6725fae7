//! Chart rendering behind a sink trait.
//!
//! A [`ChartRequest`] is a renderer-neutral description of one ticker's
//! signal chart: closes with EMA overlays and crossover markers, the MACD
//! panel, and the RSI panel. [`ChartSink`] implementations decide where it
//! goes; [`svg::SvgChartSink`] writes a standalone SVG file.

pub mod svg;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use price_feed::models::bar_series::BarSeries;
use thiserror::Error;

use crate::{
    indicators::{IndicatorSet, Macd},
    signals::{Signal, SignalReport},
};

pub use svg::SvgChartSink;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("nothing to chart for {ticker}")]
    Empty { ticker: String },

    #[error("invalid ticker for a file name: {0:?}")]
    InvalidTicker(String),

    #[error("failed to write chart {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Destination for rendered charts.
pub trait ChartSink {
    /// What a successful render yields, e.g. the written file path.
    type Output;

    fn render(&self, chart: &ChartRequest) -> Result<Self::Output, ChartError>;
}

/// A named line, index-aligned with [`ChartRequest::timestamps`].
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub ticker: String,
    pub title: String,
    pub timestamps: Vec<DateTime<Utc>>,
    pub close: Vec<f64>,
    /// EMA lines drawn over the closes.
    pub overlays: Vec<Overlay>,
    pub macd: Macd,
    pub rsi_label: String,
    pub rsi: Vec<Option<f64>>,
    pub bullish: Vec<DateTime<Utc>>,
    pub bearish: Vec<DateTime<Utc>>,
    pub signal: Signal,
}

impl ChartRequest {
    /// The signal chart for `report`'s lookback window.
    pub fn for_signal(series: &BarSeries, indicators: &IndicatorSet, report: &SignalReport) -> Self {
        let from = report.window_start_index.min(series.len());
        let tail = |v: &[f64]| v.get(from..).unwrap_or_default().to_vec();

        let since = report
            .window_start
            .map(|ts| format!(" since {}", ts.format("%Y-%m-%d")))
            .unwrap_or_default();

        Self {
            ticker: series.symbol.clone(),
            title: format!("{} - Price, EMA & Signals{since}", series.symbol),
            timestamps: series.timestamps().get(from..).unwrap_or_default().to_vec(),
            close: tail(&series.closes()),
            overlays: indicators
                .ema
                .iter()
                .map(|(period, values)| Overlay {
                    name: format!("EMA {period}"),
                    values: tail(values),
                })
                .collect(),
            macd: Macd {
                macd: tail(&indicators.macd.macd),
                signal: tail(&indicators.macd.signal),
                histogram: tail(&indicators.macd.histogram),
            },
            rsi_label: format!("RSI {}", indicators.rsi_period),
            rsi: indicators.rsi.get(from..).unwrap_or_default().to_vec(),
            bullish: report.crossovers.bullish.clone(),
            bearish: report.crossovers.bearish.clone(),
            signal: report.signal,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
