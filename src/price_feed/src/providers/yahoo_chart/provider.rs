use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{bar_series::BarSeries, request_params::BarsRequestParams},
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, ProviderError, ProviderInitError, ReqwestSnafu,
        RequestThrottle,
        yahoo_chart::{
            params::{YahooChartParams, construct_params, resolve_options, yahoo_interval},
            response::ChartEnvelope,
        },
    },
};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) price_feed/0.1";

pub struct YahooChartProvider {
    client: Client,
    throttle: RequestThrottle,
    defaults: YahooChartParams,
}

impl YahooChartProvider {
    /// Creates a new Yahoo chart provider limited to `requests_per_minute`.
    pub fn new(requests_per_minute: u32, adjusted_close: bool) -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            throttle: RequestThrottle::per_minute(requests_per_minute),
            defaults: YahooChartParams {
                adjusted_close,
                ..Default::default()
            },
        })
    }

    async fn fetch_symbol(
        &self,
        symbol: &str,
        params: &BarsRequestParams,
        options: &YahooChartParams,
    ) -> Result<BarSeries, ProviderError> {
        let query = construct_params(params, options)?;
        let url = format!("{BASE_URL}/{symbol}");

        self.throttle.acquire().await;
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        let body = response.text().await.context(ReqwestSnafu)?;

        // Yahoo reports unknown symbols as 404 with a regular chart error body.
        let envelope: Option<ChartEnvelope> = serde_json::from_str(&body).ok();
        let Some(envelope) = envelope else {
            return ApiSnafu {
                message: format!("{symbol}: HTTP {status}: {}", truncate(&body)),
            }
            .fail();
        };

        if let Some(err) = envelope.chart.error {
            return ApiSnafu {
                message: format!(
                    "{symbol}: {}: {}",
                    err.code,
                    err.description.unwrap_or_default()
                ),
            }
            .fail();
        }
        if status != StatusCode::OK {
            return ApiSnafu {
                message: format!("{symbol}: HTTP {status}"),
            }
            .fail();
        }

        let mut series = BarSeries::new(symbol, params.timeframe);
        if let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) {
            series.bars = result.into_bars(&params.timeframe, options.adjusted_close);
        }
        let dropped = series.canonicalize();
        if dropped > 0 {
            debug!(symbol, dropped, "dropped duplicate bars from chart response");
        }
        Ok(series)
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl DataProvider for YahooChartProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        yahoo_interval(&params.timeframe)?;

        if params.is_empty_range() {
            return Ok(params
                .symbols
                .iter()
                .map(|s| BarSeries::new(s.clone(), params.timeframe))
                .collect());
        }

        let options = resolve_options(&params, &self.defaults);
        let mut result = Vec::with_capacity(params.symbols.len());
        for symbol in &params.symbols {
            let series = self.fetch_symbol(symbol, &params, &options).await?;
            debug!(
                provider = self.name(),
                symbol = %symbol,
                bars = series.len(),
                "fetched chart"
            );
            result.push(series);
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::models::timeframe::TimeFrame;

    use super::*;

    #[tokio::test]
    async fn empty_range_skips_the_network() {
        let provider = YahooChartProvider::new(60, true).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let params = BarsRequestParams::single("SPY", TimeFrame::day(), ts, ts);

        let series = provider.fetch_bars(params).await.unwrap();

        assert_eq!(series.len(), 1);
        assert!(series[0].is_empty());
    }

    #[tokio::test]
    async fn unsupported_timeframe_is_a_validation_error() {
        let provider = YahooChartProvider::new(60, true).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let params = BarsRequestParams::single(
            "SPY",
            "4h".parse().unwrap(),
            start,
            start + chrono::Duration::days(1),
        );

        let err = provider.fetch_bars(params).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation { .. }));
    }

    #[test]
    fn truncate_is_char_safe() {
        let long = "é".repeat(300);
        assert_eq!(truncate(&long).chars().count(), 200);
        assert_eq!(truncate("short"), "short");
    }
}
