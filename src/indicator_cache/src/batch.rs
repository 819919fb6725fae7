//! Sequential per-ticker pipelines.
//!
//! Every ticker produces a [`TickerOutcome`]; a failure is recorded in the
//! [`BatchSummary`] and the batch moves on to the next ticker.

use std::{fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use price_feed::{models::bar_series::BarSeries, providers::DataProvider};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    chart::{ChartRequest, ChartSink},
    config::AppConfig,
    indicators::{IndicatorConfig, IndicatorSet, compute_indicators},
    signals::{SignalConfig, SignalReport, evaluate_signal},
    store::{SeriesStore, StoreError},
    sync::{SyncError, SyncOptions, SyncStatus, sync},
};

/// Chart destination used by the batch runners.
pub type DynChartSink<'a> = &'a dyn ChartSink<Output = PathBuf>;

/// What happened to one ticker that made it through its pipeline.
#[derive(Debug, Clone)]
pub struct TickerReport {
    pub ticker: String,
    /// `None` for runs that do not fetch.
    pub status: Option<SyncStatus>,
    /// Rows stored after the run.
    pub rows: usize,
    pub added: usize,
    pub saved: Option<PathBuf>,
    pub signal: Option<SignalReport>,
    pub chart: Option<PathBuf>,
}

impl fmt::Display for TickerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.ticker)?;
        if let Some(status) = self.status {
            write!(f, " {status}")?;
        }
        if self.added > 0 {
            write!(f, " +{}", self.added)?;
        }
        write!(f, " ({} rows)", self.rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerFailure {
    pub ticker: String,
    pub message: String,
}

pub type TickerOutcome = Result<TickerReport, TickerFailure>;

#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{0} has no stored history")]
    Missing(String),
}

/// Collected outcomes of one batch, in ticker order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<TickerOutcome>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TickerReport> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TickerFailure> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn signals(&self) -> impl Iterator<Item = &SignalReport> {
        self.succeeded().filter_map(|r| r.signal.as_ref())
    }

    /// `2` when there was work and every ticker failed, `0` otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.total() > 0 && self.succeeded().next().is_none() {
            2
        } else {
            0
        }
    }

    fn record(&mut self, ticker: &str, result: Result<TickerReport, StepError>) {
        let outcome = result.map_err(|err| {
            error!(ticker, error = %err, "ticker failed");
            TickerFailure {
                ticker: ticker.to_string(),
                message: err.to_string(),
            }
        });
        self.outcomes.push(outcome);
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ok = self.succeeded().count();
        writeln!(f, "SUMMARY: processed {ok}/{}", self.total())?;
        for failure in self.failures() {
            writeln!(f, "  failed {}: {}", failure.ticker, failure.message)?;
        }
        Ok(())
    }
}

/// Loads stored bars; a table that cannot be parsed counts as no history.
fn load_series(store: &dyn SeriesStore, ticker: &str) -> Result<Option<BarSeries>, StoreError> {
    match store.load(ticker) {
        Ok(table) => Ok(table.map(|t| t.series)),
        Err(err @ (StoreError::Malformed { .. } | StoreError::Csv { .. })) => {
            error!(ticker, error = %err, "stored price table is unreadable; refetching full history");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn render_chart(
    charts: Option<DynChartSink<'_>>,
    series: &BarSeries,
    indicators: &IndicatorSet,
    report: &SignalReport,
) -> Option<PathBuf> {
    let sink = charts?;
    match sink.render(&ChartRequest::for_signal(series, indicators, report)) {
        Ok(path) => Some(path),
        Err(err) => {
            warn!(ticker = %series.symbol, error = %err, "chart rendering failed");
            None
        }
    }
}

async fn sync_ticker(
    ticker: &str,
    store: &dyn SeriesStore,
    provider: &dyn DataProvider,
    config: &AppConfig,
    now: DateTime<Utc>,
    charts: Option<DynChartSink<'_>>,
) -> Result<TickerReport, StepError> {
    let existing = load_series(store, ticker)?;
    let opts = SyncOptions::new(config.history_start(now), config.timeframe);
    let report = sync(ticker, existing.as_ref(), provider, &opts, now).await?;

    if report.status == SyncStatus::NoData {
        info!(ticker, provider = provider.name(), "no bars to store");
        return Ok(TickerReport {
            ticker: ticker.to_string(),
            status: Some(report.status),
            rows: 0,
            added: 0,
            saved: None,
            signal: None,
            chart: None,
        });
    }

    let series = report.series;
    let indicators = compute_indicators(&series, &config.indicators);
    let saved = store.save(&series, &indicators)?;
    let signal = evaluate_signal(&series, &indicators, &config.signals);
    let chart = render_chart(charts, &series, &indicators, &signal);

    info!(
        ticker,
        status = %report.status,
        added = report.added,
        rows = series.len(),
        signal = %signal.signal,
        "ticker synced"
    );
    Ok(TickerReport {
        ticker: ticker.to_string(),
        status: Some(report.status),
        rows: series.len(),
        added: report.added,
        saved: Some(saved),
        signal: Some(signal),
        chart,
    })
}

/// Fetch, merge, recompute, persist, and evaluate every ticker in order.
pub async fn run_sync_batch(
    tickers: &[String],
    store: &dyn SeriesStore,
    provider: &dyn DataProvider,
    config: &AppConfig,
    now: DateTime<Utc>,
    charts: Option<DynChartSink<'_>>,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for ticker in tickers {
        let result = sync_ticker(ticker, store, provider, config, now, charts).await;
        summary.record(ticker, result);
    }
    summary
}

fn stored_tickers(store: &dyn SeriesStore) -> Result<Vec<String>, StoreError> {
    let tickers = store.list_tickers()?;
    if tickers.is_empty() {
        warn!("no stored price tables found");
    }
    Ok(tickers)
}

fn recompute_ticker(
    ticker: &str,
    store: &dyn SeriesStore,
    config: &IndicatorConfig,
) -> Result<TickerReport, StepError> {
    let table = store
        .load(ticker)?
        .ok_or_else(|| StepError::Missing(ticker.to_string()))?;
    let indicators = compute_indicators(&table.series, config);
    let saved = store.save(&table.series, &indicators)?;
    info!(ticker, rows = table.series.len(), "indicators recomputed");
    Ok(TickerReport {
        ticker: ticker.to_string(),
        status: None,
        rows: table.series.len(),
        added: 0,
        saved: Some(saved),
        signal: None,
        chart: None,
    })
}

/// Recompute and rewrite indicators for every stored table without fetching.
pub fn run_recompute_batch(
    store: &dyn SeriesStore,
    config: &IndicatorConfig,
) -> Result<BatchSummary, StoreError> {
    let mut summary = BatchSummary::default();
    for ticker in stored_tickers(store)? {
        let result = recompute_ticker(&ticker, store, config);
        summary.record(&ticker, result);
    }
    Ok(summary)
}

fn signal_ticker(
    ticker: &str,
    store: &dyn SeriesStore,
    indicators: &IndicatorConfig,
    signals: &SignalConfig,
    charts: Option<DynChartSink<'_>>,
) -> Result<TickerReport, StepError> {
    let table = store
        .load(ticker)?
        .ok_or_else(|| StepError::Missing(ticker.to_string()))?;
    let series = table.series;
    let computed = compute_indicators(&series, indicators);
    let signal = evaluate_signal(&series, &computed, signals);
    let chart = render_chart(charts, &series, &computed, &signal);
    Ok(TickerReport {
        ticker: ticker.to_string(),
        status: None,
        rows: series.len(),
        added: 0,
        saved: None,
        signal: Some(signal),
        chart,
    })
}

/// Evaluate the latest crossover signal of every stored table.
pub fn run_signal_batch(
    store: &dyn SeriesStore,
    indicators: &IndicatorConfig,
    signals: &SignalConfig,
    charts: Option<DynChartSink<'_>>,
) -> Result<BatchSummary, StoreError> {
    let mut summary = BatchSummary::default();
    for ticker in stored_tickers(store)? {
        let result = signal_ticker(&ticker, store, indicators, signals, charts);
        summary.record(&ticker, result);
    }
    Ok(summary)
}
