use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{asset::AssetClass, timeframe::TimeFrame},
    providers::{alpaca_rest::params::AlpacaBarsParams, yahoo_chart::params::YahooChartParams},
};

/// Universal parameters for requesting time-series bar data from any market data provider.
///
/// This struct is vendor-agnostic and is the standard input for all
/// [`DataProvider`](crate::providers::DataProvider) implementations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// List of symbols to request (e.g., `["AAPL"]`, `["SPY", "TQQQ"]`).
    pub symbols: Vec<String>,

    /// The time interval for each bar (e.g., 1 hour, 1 day).
    ///
    /// **Validation of allowed values is performed by each data provider
    /// implementation, according to their own API rules.**
    pub timeframe: TimeFrame,

    /// Start of the requested time range (inclusive, UTC).
    pub start: DateTime<Utc>,

    /// End of the requested time range (exclusive, UTC).
    pub end: DateTime<Utc>,

    /// The asset class for the requested symbols.
    #[serde(default)]
    pub asset_class: AssetClass,

    /// Optional, provider-specific parameters.
    #[serde(default)]
    pub provider_specific: ProviderParams,
}

impl BarsRequestParams {
    /// A request for one symbol with no provider-specific options.
    pub fn single(
        symbol: impl Into<String>,
        timeframe: TimeFrame,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            symbols: vec![symbol.into()],
            timeframe,
            start,
            end,
            asset_class: AssetClass::UsEquity,
            provider_specific: ProviderParams::None,
        }
    }

    /// An empty range is "no data", not an error.
    pub fn is_empty_range(&self) -> bool {
        self.start >= self.end
    }
}

/// Per-request options for a particular provider, kept out of the universal
/// [`BarsRequestParams`] fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ProviderParams {
    #[default]
    None,
    Alpaca(AlpacaBarsParams),
    Yahoo(YahooChartParams),
}
