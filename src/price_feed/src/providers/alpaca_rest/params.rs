use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        asset::AssetClass,
        request_params::{BarsRequestParams, ProviderParams},
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{ProviderError, ValidationSnafu},
};

/// Specifies the corporate action adjustment for stock data.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    #[default]
    Raw,
    Split,
    Dividend,
    All,
}

impl Adjustment {
    fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Split => "split",
            Self::Dividend => "dividend",
            Self::All => "all",
        }
    }
}

/// Specifies the source feed for stock data.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Sip,
    #[default]
    Iex,
    Otc,
}

impl Feed {
    fn as_str(self) -> &'static str {
        match self {
            Self::Sip => "sip",
            Self::Iex => "iex",
            Self::Otc => "otc",
        }
    }
}

/// Alpaca-specific parameters for a bars request.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AlpacaBarsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Feed>,
    /// Page size; Alpaca caps it at 10 000.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Rejects requests this provider cannot serve.
pub fn validate_request(params: &BarsRequestParams) -> Result<(), ProviderError> {
    if params.asset_class != AssetClass::UsEquity {
        return ValidationSnafu {
            message: format!(
                "Alpaca stock bars only serve US equities, got {:?}",
                params.asset_class
            ),
        }
        .fail();
    }
    if params.symbols.is_empty() {
        return ValidationSnafu {
            message: "at least one symbol is required".to_string(),
        }
        .fail();
    }
    Ok(())
}

/// Alpaca's `timeframe` query value, e.g. `15Min`, `1Hour`, `1Day`.
pub fn alpaca_timeframe(timeframe: &TimeFrame) -> String {
    let unit = match timeframe.unit {
        TimeFrameUnit::Minute => "Min",
        TimeFrameUnit::Hour => "Hour",
        TimeFrameUnit::Day => "Day",
        TimeFrameUnit::Week => "Week",
        TimeFrameUnit::Month => "Month",
    };
    format!("{}{unit}", timeframe.amount)
}

/// Builds the query string (without the page token) for a bars request.
pub fn construct_params(params: &BarsRequestParams, adjusted_default: bool) -> Vec<(String, String)> {
    let options = match &params.provider_specific {
        ProviderParams::Alpaca(p) => p.clone(),
        _ => AlpacaBarsParams::default(),
    };
    let adjustment = options.adjustment.unwrap_or(if adjusted_default {
        Adjustment::All
    } else {
        Adjustment::Raw
    });

    let mut query = vec![
        ("symbols".to_string(), params.symbols.join(",")),
        ("timeframe".to_string(), alpaca_timeframe(&params.timeframe)),
        (
            "start".to_string(),
            params.start.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (
            "end".to_string(),
            params.end.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        ("adjustment".to_string(), adjustment.as_str().to_string()),
        (
            "feed".to_string(),
            options.feed.unwrap_or_default().as_str().to_string(),
        ),
        ("sort".to_string(), "asc".to_string()),
    ];
    if let Some(limit) = options.limit {
        query.push(("limit".to_string(), limit.to_string()));
    }
    query
}
