//! Persisted per-ticker price tables.
//!
//! The store is the only source of truth between runs: one table per ticker
//! holding bars plus the derived columns of the last successful run. Derived
//! columns read back from disk are informational; callers recompute them.

mod csv;

use std::path::PathBuf;

use indexmap::IndexMap;
use price_feed::models::bar_series::BarSeries;
use thiserror::Error;

use crate::indicators::IndicatorSet;

pub use self::csv::{CsvStore, parse_timestamp};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv { path: PathBuf, source: ::csv::Error },

    /// The file exists but does not have the expected shape.
    #[error("malformed price table {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("invalid ticker for a file name: {0:?}")]
    InvalidTicker(String),

    #[error("column {column} has {actual} values but the series has {expected} bars")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// A loaded table: the bars plus whatever derived columns the file carried.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    pub series: BarSeries,
    /// Non-price columns in file order, aligned with `series.bars`.
    pub derived: IndexMap<String, Vec<Option<f64>>>,
}

/// Tickers double as file names, so anything path-like is refused.
pub(crate) fn validate_ticker(ticker: &str) -> Result<(), StoreError> {
    let ok = !ticker.is_empty()
        && !ticker.starts_with('.')
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '^' | '='));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidTicker(ticker.to_string()))
    }
}

/// Keyed storage of one table per ticker.
pub trait SeriesStore {
    /// `Ok(None)` when nothing is stored for `ticker`.
    fn load(&self, ticker: &str) -> Result<Option<PriceTable>, StoreError>;

    /// Replaces the stored table for `series.symbol`. Returns where it was written.
    fn save(&self, series: &BarSeries, indicators: &IndicatorSet) -> Result<PathBuf, StoreError>;

    /// Tickers that currently have a stored table, sorted.
    fn list_tickers(&self) -> Result<Vec<String>, StoreError>;
}
