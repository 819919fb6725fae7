//! A collection of time-series bars for a specific symbol and timeframe.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{bar::Bar, timeframe::TimeFrame};

/// Represents a complete set of time-series data for a single symbol.
///
/// This struct groups a vector of [`Bar`]s with their corresponding symbol
/// and [`TimeFrame`], making the data set self-describing. A canonical series
/// has strictly increasing timestamps; see [`BarSeries::canonicalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The symbol this data represents (e.g., "AAPL", "SPY").
    pub symbol: String,
    /// The time interval for each bar in the series.
    pub timeframe: TimeFrame,
    /// The collection of bars.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    /// An empty series.
    pub fn new(symbol: impl Into<String>, timeframe: TimeFrame) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars: Vec::new(),
        }
    }

    pub fn with_bars(symbol: impl Into<String>, timeframe: TimeFrame, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    /// True when timestamps are strictly increasing (sorted, no duplicates).
    pub fn is_canonical(&self) -> bool {
        self.bars
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    }

    /// Sorts bars ascending by timestamp and drops duplicate timestamps.
    ///
    /// When a timestamp occurs more than once, the occurrence that comes
    /// **later** in the current vector wins. Returns the number of bars dropped.
    pub fn canonicalize(&mut self) -> usize {
        if self.is_canonical() {
            return 0;
        }
        let before = self.bars.len();
        let mut by_ts: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
        for bar in self.bars.drain(..) {
            by_ts.insert(bar.timestamp, bar);
        }
        self.bars = by_ts.into_values().collect();
        before - self.bars.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn canonicalize_sorts_and_keeps_last_duplicate() {
        let mut series = BarSeries::with_bars(
            "SPY",
            TimeFrame::day(),
            vec![
                Bar::from_close(day(3), 3.0),
                Bar::from_close(day(1), 1.0),
                Bar::from_close(day(2), 2.0),
                Bar::from_close(day(1), 10.0),
            ],
        );

        let dropped = series.canonicalize();

        assert_eq!(dropped, 1);
        assert!(series.is_canonical());
        assert_eq!(series.timestamps(), vec![day(1), day(2), day(3)]);
        assert_eq!(series.closes(), vec![10.0, 2.0, 3.0]);
    }

    #[test]
    fn canonical_series_is_left_alone() {
        let mut series = BarSeries::with_bars(
            "SPY",
            TimeFrame::day(),
            vec![Bar::from_close(day(1), 1.0), Bar::from_close(day(2), 2.0)],
        );
        assert_eq!(series.canonicalize(), 0);
        assert_eq!(series.last_timestamp(), Some(day(2)));
    }
}
