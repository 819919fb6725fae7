//! Full-history indicator recompute.
//!
//! Every indicator here is a recursive or windowed function of the closes up
//! to and including each index. [`compute_indicators`] always runs over the
//! entire series; the EMA value at index `i` depends on every earlier close,
//! so resuming from a stored midpoint would drift from the full-history value.

pub mod ema;
pub mod macd;
pub mod rsi;

use std::collections::BTreeMap;

use price_feed::models::bar_series::BarSeries;
use serde::{Deserialize, Serialize};

pub use macd::Macd;
pub use rsi::RsiMethod;

/// Which indicators to derive and with which periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct IndicatorConfig {
    pub ema_periods: Vec<u32>,
    pub rsi: RsiConfig,
    pub macd: MacdConfig,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_periods: vec![12, 26, 50, 200],
            rsi: RsiConfig::default(),
            macd: MacdConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RsiConfig {
    pub period: u32,
    pub method: RsiMethod,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            period: 14,
            method: RsiMethod::Wilder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MacdConfig {
    pub fast: u32,
    pub slow: u32,
    pub signal: u32,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// Derived columns for one series, index-aligned with its bars.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    /// EMA per period, ascending by period.
    pub ema: BTreeMap<u32, Vec<f64>>,
    pub rsi_period: u32,
    pub rsi_method: RsiMethod,
    pub rsi: Vec<Option<f64>>,
    pub macd: Macd,
}

impl IndicatorSet {
    pub fn len(&self) -> usize {
        self.rsi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rsi.is_empty()
    }

    pub fn ema(&self, period: u32) -> Option<&[f64]> {
        self.ema.get(&period).map(Vec::as_slice)
    }

    /// Column names in persisted order:
    /// `EMA_<p>`…, `RSI_<n>`, `MACD`, `MACD_Signal`, `MACD_Hist`.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ema.keys().map(|p| format!("EMA_{p}")).collect();
        names.push(format!("RSI_{}", self.rsi_period));
        names.extend(["MACD", "MACD_Signal", "MACD_Hist"].map(String::from));
        names
    }

    /// `(name, values)` pairs in persisted order; see [`IndicatorSet::column_names`].
    pub fn columns(&self) -> Vec<(String, Vec<Option<f64>>)> {
        let dense = |v: &[f64]| v.iter().copied().map(Some).collect::<Vec<_>>();

        let mut cols: Vec<(String, Vec<Option<f64>>)> = self
            .ema
            .iter()
            .map(|(p, v)| (format!("EMA_{p}"), dense(v)))
            .collect();
        cols.push((format!("RSI_{}", self.rsi_period), self.rsi.clone()));
        cols.push(("MACD".to_string(), dense(&self.macd.macd)));
        cols.push(("MACD_Signal".to_string(), dense(&self.macd.signal)));
        cols.push(("MACD_Hist".to_string(), dense(&self.macd.histogram)));
        cols
    }
}

/// Recomputes every configured indicator over the whole of `series`.
pub fn compute_indicators(series: &BarSeries, config: &IndicatorConfig) -> IndicatorSet {
    let closes = series.closes();

    let ema = config
        .ema_periods
        .iter()
        .map(|&p| (p, ema::ema(&closes, p)))
        .collect();

    IndicatorSet {
        ema,
        rsi_period: config.rsi.period,
        rsi_method: config.rsi.method,
        rsi: rsi::rsi(&closes, config.rsi.period, config.rsi.method),
        macd: macd::macd(
            &closes,
            config.macd.fast,
            config.macd.slow,
            config.macd.signal,
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use price_feed::models::{bar::Bar, timeframe::TimeFrame};

    use super::*;

    fn series(closes: &[f64]) -> BarSeries {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::from_close(t0 + Duration::days(i as i64), c))
            .collect();
        BarSeries::with_bars("TEST", TimeFrame::day(), bars)
    }

    #[test]
    fn every_column_is_aligned_with_the_bars() {
        let s = series(&[10.0, 11.0, 10.5, 12.0, 12.5, 11.0]);
        let set = compute_indicators(&s, &IndicatorConfig::default());

        assert_eq!(set.len(), s.len());
        for (name, values) in set.columns() {
            assert_eq!(values.len(), s.len(), "{name}");
        }
    }

    #[test]
    fn column_order_is_stable() {
        let config = IndicatorConfig {
            ema_periods: vec![50, 12],
            ..Default::default()
        };
        let set = compute_indicators(&series(&[1.0, 2.0]), &config);
        assert_eq!(
            set.column_names(),
            vec!["EMA_12", "EMA_50", "RSI_14", "MACD", "MACD_Signal", "MACD_Hist"]
        );
        let names: Vec<String> = set.columns().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, set.column_names());
    }

    #[test]
    fn values_depend_only_on_the_prefix() {
        let closes = [10.0, 11.0, 10.5, 12.0, 12.5, 11.0, 13.0, 12.0];
        let config = IndicatorConfig::default();
        let full = compute_indicators(&series(&closes), &config);
        let prefix = compute_indicators(&series(&closes[..5]), &config);

        for ((_, p), (_, f)) in prefix.columns().iter().zip(full.columns().iter()) {
            assert_eq!(p[..], f[..5]);
        }
    }

    #[test]
    fn empty_series_gives_empty_columns() {
        let set = compute_indicators(&series(&[]), &IndicatorConfig::default());
        assert!(set.is_empty());
        assert!(set.columns().iter().all(|(_, v)| v.is_empty()));
    }
}
