//! Application configuration: parsing, normalization, and loading.
//!
//! A single TOML file drives every command. Every field has a default, so an
//! empty file (or no file at all) is a valid configuration:
//!
//! ```toml
//! data_dir = "data"
//! charts_dir = "charts"
//! tickers_file = "tickers.json"
//! timeframe = "1d"
//! history_years = 10
//!
//! [provider]
//! kind = "yahoo"            # or "alpaca"
//! requests_per_minute = 60
//! adjusted_close = false   # see ProviderSettings::adjusted_close
//!
//! [indicators]
//! ema_periods = [12, 26, 50, 200]
//! rsi = { period = 14, method = "wilder" }
//! macd = { fast = 12, slow = 26, signal = 9 }
//!
//! [signals]
//! fast = 12
//! slow = 26
//! lookback_days = 365
//!
//! [charts]
//! enabled = true
//! width = 1400
//! height = 1000
//! ```
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_config_str`]
//! - Parse + normalize from a file path: [`load_config_path`]

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use price_feed::{models::timeframe::TimeFrame, providers::ProviderSettings};
use serde::{Deserialize, Serialize};
use toml::from_str;
use tracing::debug;

use crate::{indicators::IndicatorConfig, signals::SignalConfig};

pub const DEFAULT_CONFIG_FILE: &str = "indicator_cache.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    /// Directory holding one `<TICKER>.csv` per ticker.
    pub data_dir: PathBuf,
    pub charts_dir: PathBuf,
    /// JSON ticker list used by `sync` unless overridden on the command line.
    pub tickers_file: PathBuf,
    pub timeframe: TimeFrame,
    /// First date to request for a ticker with no stored history.
    /// Takes precedence over `history_years`.
    pub start_date: Option<NaiveDate>,
    pub history_years: u32,
    pub provider: ProviderSettings,
    pub indicators: IndicatorConfig,
    pub signals: SignalConfig,
    pub charts: ChartConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            charts_dir: PathBuf::from("charts"),
            tickers_file: PathBuf::from("tickers.json"),
            timeframe: TimeFrame::day(),
            start_date: None,
            history_years: 10,
            provider: ProviderSettings::default(),
            indicators: IndicatorConfig::default(),
            signals: SignalConfig::default(),
            charts: ChartConfig::default(),
        }
    }
}

impl AppConfig {
    /// Where history starts for a ticker that has nothing stored.
    pub fn history_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.start_date {
            Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
            None => now - Duration::days(i64::from(self.history_years) * 365),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ChartConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 1400,
            height: 1000,
        }
    }
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Duplicate EMA periods removed.
    pub ema_periods_deduped: usize,
    /// Whether the EMA periods had to be reordered.
    pub ema_periods_sorted: bool,
}

/// Normalize a configuration in-place.
///
/// - EMA periods are sorted ascending and deduplicated
/// - Every period must be positive
/// - MACD `fast` must be shorter than `slow`; likewise the signal EMAs
///
/// Errors describe the first offending field.
pub fn normalize_config(cfg: &mut AppConfig) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();

    let periods = &mut cfg.indicators.ema_periods;
    if periods.contains(&0) {
        bail!("indicators.ema_periods must all be positive");
    }
    report.ema_periods_sorted = !periods.is_sorted();
    periods.sort_unstable();
    let before_len = periods.len();
    periods.dedup();
    report.ema_periods_deduped = before_len - periods.len();

    let rsi = &cfg.indicators.rsi;
    if rsi.period == 0 {
        bail!("indicators.rsi.period must be positive");
    }

    let macd = &cfg.indicators.macd;
    if macd.fast == 0 || macd.slow == 0 || macd.signal == 0 {
        bail!("indicators.macd periods must all be positive");
    }
    if macd.fast >= macd.slow {
        bail!(
            "indicators.macd.fast ({}) must be shorter than indicators.macd.slow ({})",
            macd.fast,
            macd.slow
        );
    }

    let signals = &cfg.signals;
    if signals.fast == 0 || signals.slow == 0 {
        bail!("signals.fast and signals.slow must be positive");
    }
    if signals.fast >= signals.slow {
        bail!(
            "signals.fast ({}) must be shorter than signals.slow ({})",
            signals.fast,
            signals.slow
        );
    }

    Ok(report)
}

/// Parse and normalize a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<AppConfig> {
    let mut cfg: AppConfig = from_str(toml_str).context("failed to parse config TOML")?;
    let report = normalize_config(&mut cfg).context("invalid configuration")?;
    debug!(?report, "config normalized");
    Ok(cfg)
}

/// Read a configuration file from disk, parse, and normalize it.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
        .with_context(|| format!("load config file {}", path.as_ref().display()))
}

/// Resolve the configuration for a run.
///
/// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] is used
/// when present and the defaults otherwise.
pub fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    match explicit {
        Some(path) => load_config_path(path),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => load_config_path(DEFAULT_CONFIG_FILE),
        None => {
            let mut cfg = AppConfig::default();
            normalize_config(&mut cfg)?;
            Ok(cfg)
        }
    }
}
