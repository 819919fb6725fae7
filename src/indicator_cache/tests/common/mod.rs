#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use indicator_cache::{
    config::AppConfig,
    indicators::{IndicatorConfig, compute_indicators},
    store::{CsvStore, SeriesStore},
};
use price_feed::{
    models::{
        bar::Bar, bar_series::BarSeries, request_params::BarsRequestParams, timeframe::TimeFrame,
    },
    providers::{ApiSnafu, DataProvider, ProviderError},
};
use tempfile::TempDir;

pub fn day(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i)
}

/// A deterministic, wiggly close for day `i`.
pub fn close_on(i: i64) -> f64 {
    100.0 + (i as f64 * 0.37).sin() * 8.0 + i as f64 * 0.05
}

/// Full OHLCV bars for days `range`.
pub fn daily_bars(range: std::ops::Range<i64>) -> Vec<Bar> {
    range
        .map(|i| {
            let close = close_on(i);
            Bar {
                timestamp: day(i),
                open: Some(close - 0.5),
                high: Some(close + 1.0),
                low: Some(close - 1.0),
                close,
                volume: Some(1_000_000.0 + i as f64),
                trade_count: None,
                vwap: None,
            }
        })
        .collect()
}

pub fn daily_series(ticker: &str, range: std::ops::Range<i64>) -> BarSeries {
    BarSeries::with_bars(ticker, TimeFrame::day(), daily_bars(range))
}

/// In-memory provider serving `[start, end)` out of a fixed bar universe.
#[derive(Default)]
pub struct MockProvider {
    universe: HashMap<String, Vec<Bar>>,
    failing: HashSet<String>,
    pub calls: Mutex<Vec<(String, DateTime<Utc>, DateTime<Utc>)>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.universe.insert(ticker.to_string(), bars);
        self
    }

    /// Every request for `ticker` fails with an API error.
    pub fn failing(mut self, ticker: &str) -> Self {
        self.failing.insert(ticker.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, DateTime<Utc>, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        let mut out = Vec::new();
        for symbol in &params.symbols {
            self.calls
                .lock()
                .unwrap()
                .push((symbol.clone(), params.start, params.end));
            if self.failing.contains(symbol) {
                return ApiSnafu {
                    message: format!("unknown symbol {symbol}"),
                }
                .fail();
            }
            let bars = self
                .universe
                .get(symbol)
                .map(|bars| {
                    bars.iter()
                        .filter(|b| b.timestamp >= params.start && b.timestamp < params.end)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            out.push(BarSeries::with_bars(symbol.clone(), params.timeframe, bars));
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct TestStore {
    _dir: TempDir, // keep alive for the life of the test
    pub store: CsvStore,
}

pub fn setup_store() -> TestStore {
    let dir = TempDir::new().expect("tempdir");
    let store = CsvStore::new(dir.path().join("data"), TimeFrame::day());
    TestStore { _dir: dir, store }
}

/// Persists `series` with freshly computed default indicators.
pub fn seed(store: &CsvStore, series: &BarSeries) {
    let indicators = compute_indicators(series, &IndicatorConfig::default());
    store.save(series, &indicators).expect("seed save");
}

/// Defaults, with history starting at [`day`]`(0)`.
pub fn test_config() -> AppConfig {
    AppConfig {
        start_date: day(0).date_naive().into(),
        ..AppConfig::default()
    }
}
