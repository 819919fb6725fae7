use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use price_feed::models::bar::Bar;

/// Result of [`merge_bars`].
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    /// Strictly increasing by timestamp.
    pub bars: Vec<Bar>,
    /// Timestamps that were not in `existing`.
    pub added: usize,
}

/// Appends `fetched` to `existing`, deduplicates by timestamp and sorts.
///
/// On a timestamp collision the later occurrence wins: a fetched bar replaces
/// a stored one, and within `fetched` the last bar for a timestamp is kept.
pub fn merge_bars(existing: &[Bar], fetched: Vec<Bar>) -> Merged {
    let mut by_ts: BTreeMap<DateTime<Utc>, Bar> = existing
        .iter()
        .map(|bar| (bar.timestamp, bar.clone()))
        .collect();
    let before = by_ts.len();
    for bar in fetched {
        by_ts.insert(bar.timestamp, bar);
    }
    let bars: Vec<Bar> = by_ts.into_values().collect();
    let added = bars.len() - before;
    Merged { bars, added }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;

    fn day(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i)
    }

    fn bars(points: &[(i64, f64)]) -> Vec<Bar> {
        points
            .iter()
            .map(|&(d, c)| Bar::from_close(day(d), c))
            .collect()
    }

    #[test]
    fn overlapping_fetch_replaces_boundary_bar() {
        let existing = bars(&[(0, 1.0), (1, 2.0), (2, 3.0)]);
        let fetched = bars(&[(2, 3.5), (3, 4.0)]);

        let merged = merge_bars(&existing, fetched);

        assert_eq!(merged.added, 1);
        let closes: Vec<f64> = merged.bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.5, 4.0]);
    }

    #[test]
    fn unsorted_fetch_is_sorted() {
        let merged = merge_bars(&[], bars(&[(5, 5.0), (1, 1.0), (3, 3.0)]));
        let ts: Vec<_> = merged.bars.iter().map(|b| b.timestamp).collect();
        assert_eq!(ts, vec![day(1), day(3), day(5)]);
        assert_eq!(merged.added, 3);
    }

    #[test]
    fn duplicate_within_fetch_keeps_last() {
        let merged = merge_bars(&[], bars(&[(1, 1.0), (1, 9.0)]));
        assert_eq!(merged.bars.len(), 1);
        assert_eq!(merged.bars[0].close, 9.0);
    }

    #[test]
    fn empty_fetch_is_a_no_op() {
        let existing = bars(&[(0, 1.0), (1, 2.0)]);
        let merged = merge_bars(&existing, Vec::new());
        assert_eq!(merged.bars, existing);
        assert_eq!(merged.added, 0);
    }

    proptest! {
        #[test]
        fn merged_is_strictly_increasing_and_fetched_wins(
            existing in proptest::collection::btree_map(0i64..200, 0.0f64..500.0, 0..60),
            fetched in proptest::collection::vec((0i64..200, 500.0f64..1000.0), 0..60),
        ) {
            let existing: Vec<(i64, f64)> = existing.into_iter().collect();
            let merged = merge_bars(&bars(&existing), bars(&fetched));

            prop_assert!(merged.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

            // every fetched timestamp carries the last fetched close for it
            let mut last_fetched = BTreeMap::new();
            for &(d, c) in &fetched {
                last_fetched.insert(day(d), c);
            }
            for bar in &merged.bars {
                if let Some(&c) = last_fetched.get(&bar.timestamp) {
                    prop_assert_eq!(bar.close, c);
                }
            }

            let mut all: std::collections::BTreeSet<i64> = existing.iter().map(|&(d, _)| d).collect();
            let before = all.len();
            all.extend(fetched.iter().map(|&(d, _)| d));
            prop_assert_eq!(merged.bars.len(), all.len());
            prop_assert_eq!(merged.added, all.len() - before);
        }
    }
}
