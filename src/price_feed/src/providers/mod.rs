//! Provider abstraction for market data sources.
//!
//! This module defines the [`DataProvider`] trait, which serves as a unified interface
//! for fetching time-series bar data from any market data vendor. Each concrete
//! provider handles vendor-specific API logic and validation:
//!
//! - [`yahoo_chart::provider::YahooChartProvider`]: the public Yahoo chart API, no keys.
//! - [`alpaca_rest::provider::AlpacaProvider`]: Alpaca market data v2, keys from env.
//!
//! The trait is designed for async usage and supports dynamic dispatch (`dyn DataProvider`)
//! for runtime selection of providers, see [`build_provider`].
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use price_feed::models::{bar_series::BarSeries, request_params::BarsRequestParams};
//! use price_feed::providers::{DataProvider, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     async fn fetch_bars(
//!         &self,
//!         _params: BarsRequestParams,
//!     ) -> Result<Vec<BarSeries>, ProviderError> {
//!         Ok(vec![])
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "mine"
//!     }
//! }
//! ```

pub mod alpaca_rest;
mod session;
mod throttle;
pub mod yahoo_chart;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{bar_series::BarSeries, request_params::BarsRequestParams};

pub use throttle::{DEFAULT_REQUESTS_PER_MINUTE, RequestThrottle};

/// Trait for fetching time-series bar data from a market data provider.
///
/// Implementations must return `Ok` with empty series when the requested range
/// simply has no bars; errors are reserved for transport and API failures.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches time-series bar data for the given request parameters.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BarSeries>)` - One canonical (sorted, deduplicated) series per symbol.
    /// * `Err(ProviderError)` - If the request fails.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError>;

    /// Short provider code used in logs.
    fn name(&self) -> &'static str;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider's API returned a specific error message (e.g., unknown symbol).
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An internal error occurred while processing data within the provider.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

/// Which vendor to fetch from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Alpaca,
}

/// Provider selection plus the knobs shared by every provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    /// Upper bound on outgoing requests per minute.
    pub requests_per_minute: u32,
    /// Return split/dividend adjusted prices where the vendor supports it.
    ///
    /// Off by default. Vendors rescale every earlier adjusted close on each
    /// dividend or split, so bars appended to an adjusted history show a step
    /// at the ex-date unless the whole history is refetched.
    pub adjusted_close: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Yahoo,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            adjusted_close: false,
        }
    }
}

/// Builds the configured provider behind a trait object.
pub fn build_provider(
    settings: &ProviderSettings,
) -> Result<Box<dyn DataProvider>, ProviderInitError> {
    let provider: Box<dyn DataProvider> = match settings.kind {
        ProviderKind::Yahoo => Box::new(yahoo_chart::provider::YahooChartProvider::new(
            settings.requests_per_minute,
            settings.adjusted_close,
        )?),
        ProviderKind::Alpaca => Box::new(alpaca_rest::provider::AlpacaProvider::new(
            settings.requests_per_minute,
            settings.adjusted_close,
        )?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::models::timeframe::TimeFrame;

    use super::*;

    struct StaticProvider;
    struct EmptyProvider;

    #[async_trait]
    impl DataProvider for StaticProvider {
        async fn fetch_bars(
            &self,
            params: BarsRequestParams,
        ) -> Result<Vec<BarSeries>, ProviderError> {
            Ok(params
                .symbols
                .iter()
                .map(|s| BarSeries::new(s.clone(), params.timeframe))
                .collect())
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    #[async_trait]
    impl DataProvider for EmptyProvider {
        async fn fetch_bars(
            &self,
            _params: BarsRequestParams,
        ) -> Result<Vec<BarSeries>, ProviderError> {
            Ok(vec![])
        }

        fn name(&self) -> &'static str {
            "empty"
        }
    }

    // Picks a provider at runtime; only possible through `Box<dyn DataProvider>`.
    fn get_provider(name: &str) -> Box<dyn DataProvider> {
        if name == "static" {
            Box::new(StaticProvider)
        } else {
            Box::new(EmptyProvider)
        }
    }

    #[tokio::test]
    async fn test_dynamic_provider() {
        let provider = get_provider("static");
        let now = Utc::now();
        let params = BarsRequestParams::single("SPY", TimeFrame::day(), now, now);

        let result = provider.fetch_bars(params).await.unwrap();
        assert_eq!(provider.name(), "static");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].symbol, "SPY");
    }

    #[test]
    fn provider_settings_defaults_from_empty_toml_like_json() {
        let settings: ProviderSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, ProviderSettings::default());

        let settings: ProviderSettings =
            serde_json::from_str(r#"{"kind": "alpaca", "requests_per_minute": 200}"#).unwrap();
        assert_eq!(settings.kind, ProviderKind::Alpaca);
        assert_eq!(settings.requests_per_minute, 200);
        assert!(!settings.adjusted_close);

        let settings: ProviderSettings =
            serde_json::from_str(r#"{"adjusted_close": true}"#).unwrap();
        assert!(settings.adjusted_close);
    }
}
