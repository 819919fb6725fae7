use serde::{Deserialize, Serialize};

use crate::{
    models::{
        request_params::{BarsRequestParams, ProviderParams},
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{ProviderError, ValidationSnafu},
};

/// Yahoo-specific parameters for a chart request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YahooChartParams {
    /// Replace closes with dividend/split adjusted closes and scale OHLC to match.
    #[serde(default = "default_true")]
    pub adjusted_close: bool,
    /// Include pre- and post-market bars for intraday intervals.
    #[serde(default)]
    pub include_pre_post: bool,
}

fn default_true() -> bool {
    true
}

impl Default for YahooChartParams {
    fn default() -> Self {
        Self {
            adjusted_close: true,
            include_pre_post: false,
        }
    }
}

/// Maps a [`TimeFrame`] onto the `interval` values the chart endpoint accepts.
pub fn yahoo_interval(timeframe: &TimeFrame) -> Result<&'static str, ProviderError> {
    let interval = match (timeframe.unit, timeframe.amount) {
        (TimeFrameUnit::Minute, 1) => "1m",
        (TimeFrameUnit::Minute, 2) => "2m",
        (TimeFrameUnit::Minute, 5) => "5m",
        (TimeFrameUnit::Minute, 15) => "15m",
        (TimeFrameUnit::Minute, 30) => "30m",
        (TimeFrameUnit::Hour, 1) => "1h",
        (TimeFrameUnit::Day, 1) => "1d",
        (TimeFrameUnit::Week, 1) => "1wk",
        (TimeFrameUnit::Month, 1) => "1mo",
        (TimeFrameUnit::Month, 3) => "3mo",
        _ => {
            return ValidationSnafu {
                message: format!("Yahoo chart API does not support timeframe {timeframe}"),
            }
            .fail();
        }
    };
    Ok(interval)
}

/// Resolves the Yahoo options for a request, falling back to `defaults` when
/// the caller did not pass any.
pub fn resolve_options(params: &BarsRequestParams, defaults: &YahooChartParams) -> YahooChartParams {
    match &params.provider_specific {
        ProviderParams::Yahoo(p) => p.clone(),
        _ => defaults.clone(),
    }
}

/// Builds the query string for one symbol's chart request.
pub fn construct_params(
    params: &BarsRequestParams,
    options: &YahooChartParams,
) -> Result<Vec<(String, String)>, ProviderError> {
    let interval = yahoo_interval(&params.timeframe)?;
    Ok(vec![
        ("period1".to_string(), params.start.timestamp().to_string()),
        ("period2".to_string(), params.end.timestamp().to_string()),
        ("interval".to_string(), interval.to_string()),
        (
            "includePrePost".to_string(),
            options.include_pre_post.to_string(),
        ),
        ("events".to_string(), "div,split".to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn maps_supported_intervals() {
        assert_eq!(yahoo_interval(&TimeFrame::day()).unwrap(), "1d");
        assert_eq!(yahoo_interval(&TimeFrame::hour()).unwrap(), "1h");
        assert_eq!(
            yahoo_interval(&"1w".parse().unwrap()).unwrap(),
            "1wk"
        );
    }

    #[test]
    fn rejects_unsupported_intervals() {
        let err = yahoo_interval(&"4h".parse().unwrap()).unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
        assert!(yahoo_interval(&"6mo".parse().unwrap()).is_err());
    }

    #[test]
    fn query_uses_epoch_seconds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let params = BarsRequestParams::single("SPY", TimeFrame::day(), start, end);

        let query = construct_params(&params, &YahooChartParams::default()).unwrap();

        assert!(query.contains(&("period1".to_string(), "1704153600".to_string())));
        assert!(query.contains(&("period2".to_string(), "1704412800".to_string())));
        assert!(query.contains(&("interval".to_string(), "1d".to_string())));
    }
}
