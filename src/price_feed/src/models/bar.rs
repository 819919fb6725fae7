//! Canonical in-memory representation of a time-series bar.
//!
//! This struct is the standard output of every [`DataProvider`](crate::providers::DataProvider)
//! implementation and the row type of every persisted price table. Only the
//! close is mandatory: indicator math runs on closes, the rest passes through.

use chrono::{DateTime, Utc};

/// A single observation for one trading interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Start of the interval (UTC). Daily and longer bars are normalized to
    /// midnight UTC of the exchange-local session date.
    pub timestamp: DateTime<Utc>,

    /// Opening price, when the source supplies it.
    pub open: Option<f64>,

    /// Highest price during the interval.
    pub high: Option<f64>,

    /// Lowest price during the interval.
    pub low: Option<f64>,

    /// Closing price.
    pub close: f64,

    /// Volume traded during the interval.
    pub volume: Option<f64>,

    /// Trade count for the bar. Not all providers supply this.
    pub trade_count: Option<u64>,

    /// Volume-weighted average price. Not all providers supply this.
    pub vwap: Option<f64>,
}

impl Bar {
    /// A bar that only carries a close price.
    pub fn from_close(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
            trade_count: None,
            vwap: None,
        }
    }
}
