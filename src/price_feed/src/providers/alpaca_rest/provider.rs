use async_trait::async_trait;
use chrono_tz::America::New_York;
use indexmap::IndexMap;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{bar_series::BarSeries, request_params::BarsRequestParams},
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, InvalidApiKeySnafu, MissingEnvVarSnafu,
        ProviderError, ProviderInitError, ReqwestSnafu, RequestThrottle,
        alpaca_rest::{
            params::{construct_params, validate_request},
            response::{AlpacaBar, AlpacaErrorBody, AlpacaResponse},
        },
        session::ExchangeZone,
    },
};

const BASE_URL: &str = "https://data.alpaca.markets/v2/stocks/bars";

pub struct AlpacaProvider {
    client: Client,
    throttle: RequestThrottle,
    adjusted_close: bool,
    _api_key: SecretString,
    _secret_key: SecretString,
}

impl AlpacaProvider {
    /// Creates a new Alpaca provider.
    ///
    /// Reads API keys from the `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`
    /// environment variables.
    pub fn new(requests_per_minute: u32, adjusted_close: bool) -> Result<Self, ProviderInitError> {
        let api_key = SecretString::from(get_env_var("APCA_API_KEY_ID").context(MissingEnvVarSnafu)?);
        let secret_key =
            SecretString::from(get_env_var("APCA_API_SECRET_KEY").context(MissingEnvVarSnafu)?);

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            header::HeaderValue::from_str(api_key.expose_secret()).context(InvalidApiKeySnafu)?,
        );
        let mut secret = header::HeaderValue::from_str(secret_key.expose_secret())
            .context(InvalidApiKeySnafu)?;
        secret.set_sensitive(true);
        headers.insert("APCA-API-SECRET-KEY", secret);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            throttle: RequestThrottle::per_minute(requests_per_minute),
            adjusted_close,
            _api_key: api_key,
            _secret_key: secret_key,
        })
    }
}

#[async_trait]
impl DataProvider for AlpacaProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        validate_request(&params)?;

        // Seed every requested symbol so empty ones still come back as empty series.
        let mut all_bars: IndexMap<String, Vec<AlpacaBar>> = params
            .symbols
            .iter()
            .map(|s| (s.clone(), Vec::new()))
            .collect();

        if !params.is_empty_range() {
            let mut next_page_token: Option<String> = None;
            loop {
                let mut query_params = construct_params(&params, self.adjusted_close);
                if let Some(token) = &next_page_token {
                    query_params.push(("page_token".to_string(), token.clone()));
                }

                self.throttle.acquire().await;
                let response = self
                    .client
                    .get(BASE_URL)
                    .query(&query_params)
                    .send()
                    .await
                    .context(ReqwestSnafu)?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let message = serde_json::from_str::<AlpacaErrorBody>(&body)
                        .map(|e| e.message)
                        .unwrap_or(body);
                    return ApiSnafu {
                        message: format!("HTTP {status}: {message}"),
                    }
                    .fail();
                }

                let page = response
                    .json::<AlpacaResponse>()
                    .await
                    .context(ReqwestSnafu)?;

                // Merge the bars from the current page into our collection.
                for (symbol, bars) in page.bars.unwrap_or_default() {
                    all_bars.entry(symbol).or_default().extend(bars);
                }

                match page.next_page_token {
                    Some(token) if !token.is_empty() => next_page_token = Some(token),
                    _ => break,
                }
            }
        }

        let zone = ExchangeZone::Named(New_York);
        let result = all_bars
            .into_iter()
            .map(|(symbol, alpaca_bars)| {
                let bars = alpaca_bars
                    .into_iter()
                    .map(|ab| ab.into_bar(&params.timeframe, zone))
                    .collect();
                let mut series = BarSeries::with_bars(symbol, params.timeframe, bars);
                series.canonicalize();
                debug!(
                    provider = self.name(),
                    symbol = %series.symbol,
                    bars = series.len(),
                    "fetched bars"
                );
                series
            })
            .collect();

        Ok(result)
    }

    fn name(&self) -> &'static str {
        "alpaca"
    }
}
