//! Incremental fetch-and-merge for one ticker.
//!
//! [`sync`] decides what range to ask the provider for, merges the answer into
//! the stored series and reports what happened. It performs no I/O apart from
//! the provider call; loading and saving belong to the caller.

pub mod merge;

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use price_feed::{
    models::{bar_series::BarSeries, request_params::BarsRequestParams, timeframe::TimeFrame},
    providers::{DataProvider, ProviderError},
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use merge::{Merged, merge_bars};

/// The furthest back Yahoo serves hourly bars.
pub const DEFAULT_INTRADAY_LOOKBACK_DAYS: i64 = 729;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Where history starts when nothing is stored yet.
    pub start: DateTime<Utc>,
    pub timeframe: TimeFrame,
    /// Providers only keep this much intraday history; older request starts are clamped.
    pub intraday_max_lookback: Option<Duration>,
}

impl SyncOptions {
    pub fn new(start: DateTime<Utc>, timeframe: TimeFrame) -> Self {
        Self {
            start,
            timeframe,
            intraday_max_lookback: Some(Duration::days(DEFAULT_INTRADAY_LOOKBACK_DAYS)),
        }
    }

    fn clamp_start(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.intraday_max_lookback {
            Some(lookback) if self.timeframe.is_intraday() => start.max(now - lookback),
            _ => start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// First fetch produced a new series.
    Created,
    /// New bars were appended.
    Extended,
    /// The provider was asked but had nothing newer.
    NoNewData,
    /// The next bar would start in the future; no request was made.
    UpToDate,
    /// First fetch returned nothing. Nothing should be persisted.
    NoData,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Created => "created",
            SyncStatus::Extended => "extended",
            SyncStatus::NoNewData => "no new data",
            SyncStatus::UpToDate => "up to date",
            SyncStatus::NoData => "no data",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub series: BarSeries,
    pub status: SyncStatus,
    /// Bars the provider returned.
    pub fetched: usize,
    /// Rows the series gained.
    pub added: usize,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetching {ticker} from {provider} failed: {source}")]
    Fetch {
        ticker: String,
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("{ticker} is stored as {stored} bars but {requested} was requested")]
    TimeframeMismatch {
        ticker: String,
        stored: TimeFrame,
        requested: TimeFrame,
    },
}

/// Brings `existing` up to `now` using `source`.
///
/// - Nothing stored (or an empty table): request `[opts.start, now)`.
/// - Otherwise `fetch_start = timeframe.advance(last)`; when that is after
///   `now` no request is made, else `[fetch_start, now)` is requested.
///
/// Fetched bars whose interval has not closed by `now` are discarded; the
/// next run requests them again from the same `fetch_start`.
///
/// The returned series is `existing` plus the fetched bars, deduplicated by
/// timestamp (fetched wins) and sorted.
pub async fn sync(
    ticker: &str,
    existing: Option<&BarSeries>,
    source: &dyn DataProvider,
    opts: &SyncOptions,
    now: DateTime<Utc>,
) -> Result<SyncReport, SyncError> {
    let existing = existing.filter(|s| !s.is_empty());

    if let Some(stored) = existing {
        if stored.timeframe != opts.timeframe {
            return Err(SyncError::TimeframeMismatch {
                ticker: ticker.to_string(),
                stored: stored.timeframe,
                requested: opts.timeframe,
            });
        }
    }

    let stored_last = existing.and_then(|s| s.last_timestamp().map(|last| (s, last)));
    let start = match stored_last {
        Some((stored, last)) => {
            let fetch_start = opts.timeframe.advance(last);
            if fetch_start > now {
                debug!(ticker, %last, "already up to date, skipping fetch");
                return Ok(SyncReport {
                    series: stored.clone(),
                    status: SyncStatus::UpToDate,
                    fetched: 0,
                    added: 0,
                });
            }
            let clamped = opts.clamp_start(fetch_start, now);
            if clamped > fetch_start {
                warn!(
                    ticker,
                    %fetch_start,
                    %clamped,
                    "stored intraday history is older than the provider keeps; leaving a gap"
                );
            }
            clamped
        }
        None => opts.clamp_start(opts.start, now),
    };

    let params = BarsRequestParams::single(ticker, opts.timeframe, start, now);
    let fetched = source
        .fetch_bars(params)
        .await
        .map_err(|source_err| SyncError::Fetch {
            ticker: ticker.to_string(),
            provider: source.name(),
            source: source_err,
        })?;

    let mut fetched_bars = fetched
        .into_iter()
        .find(|s| s.symbol.eq_ignore_ascii_case(ticker))
        .map(|s| s.bars)
        .unwrap_or_default();
    let fetched_count = fetched_bars.len();

    // a bar whose interval is still open carries a live price, not a close
    fetched_bars.retain(|bar| opts.timeframe.advance(bar.timestamp) <= now);
    let still_open = fetched_count - fetched_bars.len();
    if still_open > 0 {
        info!(ticker, still_open, "skipped bars whose interval has not closed yet");
    }

    let report = match existing {
        Some(stored) => {
            let Merged { bars, added } = merge_bars(&stored.bars, fetched_bars);
            let status = if added > 0 {
                SyncStatus::Extended
            } else {
                SyncStatus::NoNewData
            };
            SyncReport {
                series: BarSeries::with_bars(ticker, opts.timeframe, bars),
                status,
                fetched: fetched_count,
                added,
            }
        }
        None => {
            let Merged { bars, added } = merge_bars(&[], fetched_bars);
            let status = if bars.is_empty() {
                warn!(ticker, %start, "provider returned no history");
                SyncStatus::NoData
            } else {
                SyncStatus::Created
            };
            SyncReport {
                series: BarSeries::with_bars(ticker, opts.timeframe, bars),
                status,
                fetched: fetched_count,
                added,
            }
        }
    };

    info!(
        ticker,
        status = %report.status,
        fetched = report.fetched,
        added = report.added,
        rows = report.series.len(),
        "synced"
    );
    Ok(report)
}
