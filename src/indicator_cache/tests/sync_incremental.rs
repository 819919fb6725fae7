mod common;

use chrono::Duration;
use common::{MockProvider, daily_bars, daily_series, day};
use indicator_cache::sync::{SyncError, SyncOptions, SyncStatus, sync};
use price_feed::models::{bar::Bar, bar_series::BarSeries, timeframe::TimeFrame};

fn daily_opts() -> SyncOptions {
    SyncOptions::new(day(0), TimeFrame::day())
}

#[tokio::test]
async fn first_sync_requests_full_history() {
    let provider = MockProvider::new().with_bars("SPY", daily_bars(0..30));
    let now = day(30);

    let report = sync("SPY", None, &provider, &daily_opts(), now).await.unwrap();

    assert_eq!(report.status, SyncStatus::Created);
    assert_eq!(report.series.len(), 30);
    assert_eq!(report.added, 30);
    assert_eq!(provider.calls(), vec![("SPY".to_string(), day(0), now)]);
}

#[tokio::test]
async fn incremental_sync_starts_after_the_last_bar() {
    let stored = daily_series("SPY", 0..20);
    let provider = MockProvider::new().with_bars("SPY", daily_bars(0..25));
    let now = day(25);

    let report = sync("SPY", Some(&stored), &provider, &daily_opts(), now)
        .await
        .unwrap();

    assert_eq!(report.status, SyncStatus::Extended);
    assert_eq!(report.fetched, 5);
    assert_eq!(report.added, 5);
    assert_eq!(report.series.bars[..20], stored.bars[..]);
    assert_eq!(provider.calls()[0].1, day(20));
}

#[tokio::test]
async fn future_fetch_start_skips_the_provider() {
    let stored = daily_series("SPY", 0..20);
    let provider = MockProvider::new().with_bars("SPY", daily_bars(0..25));
    // the next daily bar would be stamped day(20), which is still ahead of now
    let now = day(19) + Duration::hours(23);

    let report = sync("SPY", Some(&stored), &provider, &daily_opts(), now)
        .await
        .unwrap();

    assert_eq!(report.status, SyncStatus::UpToDate);
    assert_eq!(report.series, stored);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn fetched_bars_keep_their_fields() {
    let stored = daily_series("SPY", 0..9);
    let mut revised = Bar::from_close(day(9), 42.0);
    revised.volume = Some(7.0);
    let mut universe = daily_bars(10..12);
    universe.insert(0, revised.clone());
    let provider = MockProvider::new().with_bars("SPY", universe);

    let report = sync("SPY", Some(&stored), &provider, &daily_opts(), day(12))
        .await
        .unwrap();

    assert_eq!(report.series.len(), 12);
    assert_eq!(report.series.bars[9], revised);
    assert_eq!(report.added, 3);
}

#[tokio::test]
async fn empty_stored_series_counts_as_absent() {
    let provider = MockProvider::new().with_bars("SPY", daily_bars(0..5));
    let empty = BarSeries::new("SPY", TimeFrame::day());

    let report = sync("SPY", Some(&empty), &provider, &daily_opts(), day(5))
        .await
        .unwrap();

    assert_eq!(report.status, SyncStatus::Created);
    assert_eq!(provider.calls()[0].1, day(0));
}

#[tokio::test]
async fn first_sync_with_no_bars_is_no_data() {
    let provider = MockProvider::new();

    let report = sync("NEW", None, &provider, &daily_opts(), day(5)).await.unwrap();

    assert_eq!(report.status, SyncStatus::NoData);
    assert!(report.series.is_empty());
}

#[tokio::test]
async fn provider_failure_names_ticker_and_provider() {
    let provider = MockProvider::new().failing("BAD");

    let err = sync("BAD", None, &provider, &daily_opts(), day(5))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Fetch { provider: "mock", .. }));
    assert!(err.to_string().contains("BAD"));
}

#[tokio::test]
async fn stored_timeframe_must_match() {
    let stored = daily_series("SPY", 0..5);
    let provider = MockProvider::new();
    let opts = SyncOptions::new(day(0), TimeFrame::hour());

    let err = sync("SPY", Some(&stored), &provider, &opts, day(5))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::TimeframeMismatch { .. }));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn bar_of_the_open_interval_is_discarded() {
    let provider = MockProvider::new().with_bars("SPY", daily_bars(0..30));
    let now = day(29) + Duration::hours(12);

    let report = sync("SPY", None, &provider, &daily_opts(), now).await.unwrap();

    assert_eq!(report.fetched, 30);
    assert_eq!(report.series.len(), 29);
    assert_eq!(report.series.last_timestamp(), Some(day(28)));

    // picked up from the same start once the day has closed
    let later = sync("SPY", Some(&report.series), &provider, &daily_opts(), day(30))
        .await
        .unwrap();
    assert_eq!(later.status, SyncStatus::Extended);
    assert_eq!(later.added, 1);
    assert_eq!(provider.calls()[1].1, day(29));
}

#[tokio::test]
async fn only_closed_hourly_bars_are_kept() {
    let t0 = day(3);
    let bars: Vec<Bar> = (0..5)
        .map(|h| Bar::from_close(t0 + Duration::hours(h), 10.0 + h as f64))
        .collect();
    let provider = MockProvider::new().with_bars("SPY", bars);
    let opts = SyncOptions::new(t0, TimeFrame::hour());
    let now = t0 + Duration::hours(4) + Duration::minutes(30);

    let report = sync("SPY", None, &provider, &opts, now).await.unwrap();

    assert_eq!(report.series.len(), 4);
    assert_eq!(report.series.last_timestamp(), Some(t0 + Duration::hours(3)));
}
