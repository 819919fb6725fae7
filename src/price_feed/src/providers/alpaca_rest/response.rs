use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    models::{bar::Bar, timeframe::TimeFrame},
    providers::session::{ExchangeZone, session_midnight_utc},
};

#[derive(Deserialize, Debug)]
pub struct AlpacaBar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    #[serde(rename = "n", default)]
    pub trade_count: Option<u64>,
    #[serde(rename = "vw", default)]
    pub vwap: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct AlpacaResponse {
    /// `null` when no symbol has bars in the range.
    #[serde(default)]
    pub bars: Option<IndexMap<String, Vec<AlpacaBar>>>,
    pub next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct AlpacaErrorBody {
    pub message: String,
}

impl AlpacaBar {
    /// Daily and longer bars come stamped at New York midnight.
    pub(crate) fn into_bar(self, timeframe: &TimeFrame, zone: ExchangeZone) -> Bar {
        let timestamp = if timeframe.is_intraday() {
            self.timestamp
        } else {
            session_midnight_utc(self.timestamp, zone)
        };
        Bar {
            timestamp,
            open: Some(self.open),
            high: Some(self.high),
            low: Some(self.low),
            close: self.close,
            volume: Some(self.volume),
            trade_count: self.trade_count,
            vwap: self.vwap,
        }
    }
}
