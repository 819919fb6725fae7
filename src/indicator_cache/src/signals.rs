//! EMA crossover detection and the latest-signal label.
//!
//! With `d = fast − slow`, a bullish crossover at `t` means `d[t] > 0` and
//! `d[t−1] <= 0`; bearish is the mirror image. Index 0 has no predecessor and
//! never signals.

use std::{borrow::Cow, fmt};

use chrono::{DateTime, Duration, Utc};
use price_feed::models::bar_series::BarSeries;
use serde::{Deserialize, Serialize};

use crate::indicators::{IndicatorSet, ema::ema};

/// Direction of the most recent crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Bullish => "Bullish",
            Signal::Bearish => "Bearish",
            Signal::Neutral => "Neutral",
        };
        f.write_str(s)
    }
}

/// Crossover positions within a difference series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossoverIndices {
    pub bullish: Vec<usize>,
    pub bearish: Vec<usize>,
}

/// Finds sign changes in `diff`.
pub fn crossover_indices(diff: &[f64]) -> CrossoverIndices {
    let mut out = CrossoverIndices::default();
    for (i, w) in diff.windows(2).enumerate() {
        let (prev, cur) = (w[0], w[1]);
        if cur > 0.0 && prev <= 0.0 {
            out.bullish.push(i + 1);
        } else if cur < 0.0 && prev >= 0.0 {
            out.bearish.push(i + 1);
        }
    }
    out
}

/// Crossover timestamps for one series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Crossovers {
    pub bullish: Vec<DateTime<Utc>>,
    pub bearish: Vec<DateTime<Utc>>,
}

impl Crossovers {
    pub fn last_bullish(&self) -> Option<DateTime<Utc>> {
        self.bullish.iter().max().copied()
    }

    pub fn last_bearish(&self) -> Option<DateTime<Utc>> {
        self.bearish.iter().max().copied()
    }

    /// The later of the last bullish and last bearish crossover; a present
    /// crossover beats an absent one.
    pub fn latest_signal(&self) -> Signal {
        match (self.last_bullish(), self.last_bearish()) {
            (Some(bull), Some(bear)) if bull > bear => Signal::Bullish,
            (Some(_), Some(_)) => Signal::Bearish,
            (Some(_), None) => Signal::Bullish,
            (None, Some(_)) => Signal::Bearish,
            (None, None) => Signal::Neutral,
        }
    }
}

/// Detects crossovers of `fast` over `slow`. The three slices are index-aligned;
/// extra trailing elements in any of them are ignored.
pub fn detect_crossovers(timestamps: &[DateTime<Utc>], fast: &[f64], slow: &[f64]) -> Crossovers {
    let diff: Vec<f64> = fast.iter().zip(slow).map(|(f, s)| f - s).collect();
    let idx = crossover_indices(&diff[..diff.len().min(timestamps.len())]);
    Crossovers {
        bullish: idx.bullish.into_iter().map(|i| timestamps[i]).collect(),
        bearish: idx.bearish.into_iter().map(|i| timestamps[i]).collect(),
    }
}

/// Which EMAs to compare and how far back to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SignalConfig {
    pub fast: u32,
    pub slow: u32,
    /// Days before the last bar that still count as recent.
    pub lookback_days: u32,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            lookback_days: 365,
        }
    }
}

/// Outcome of [`evaluate_signal`] for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReport {
    pub ticker: String,
    pub signal: Signal,
    pub crossovers: Crossovers,
    /// Index of the first bar inside the lookback window.
    pub window_start_index: usize,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub last_close: Option<f64>,
}

impl fmt::Display for SignalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} {}", self.ticker, self.signal)?;
        let last = match self.signal {
            Signal::Bullish => self.crossovers.last_bullish(),
            Signal::Bearish => self.crossovers.last_bearish(),
            Signal::Neutral => None,
        };
        if let Some(ts) = last {
            write!(f, " since {}", ts.format("%Y-%m-%d"))?;
        }
        if let Some(close) = self.last_close {
            write!(f, " (close {close:.2})")?;
        }
        Ok(())
    }
}

/// Labels a ticker by its latest EMA crossover within the trailing window.
///
/// EMAs come from `indicators` when they carry the configured periods and are
/// computed from the closes otherwise. They are always full-history EMAs; only
/// the crossover search is restricted to the window.
pub fn evaluate_signal(
    series: &BarSeries,
    indicators: &IndicatorSet,
    config: &SignalConfig,
) -> SignalReport {
    let closes = series.closes();
    let ema_for = |period: u32| -> Cow<'_, [f64]> {
        match indicators.ema(period) {
            Some(v) if v.len() == closes.len() => Cow::Borrowed(v),
            _ => Cow::Owned(ema(&closes, period)),
        }
    };
    let fast = ema_for(config.fast);
    let slow = ema_for(config.slow);

    let timestamps = series.timestamps();
    let window_end = series.last_timestamp();
    let start_index = window_end
        .map(|end| {
            let cutoff = end - Duration::days(i64::from(config.lookback_days));
            timestamps.partition_point(|ts| *ts < cutoff)
        })
        .unwrap_or(0);

    let crossovers = detect_crossovers(
        &timestamps[start_index..],
        &fast[start_index..],
        &slow[start_index..],
    );

    SignalReport {
        ticker: series.symbol.clone(),
        signal: crossovers.latest_signal(),
        crossovers,
        window_start_index: start_index,
        window_start: timestamps.get(start_index).copied(),
        window_end,
        last_close: closes.last().copied(),
    }
}
