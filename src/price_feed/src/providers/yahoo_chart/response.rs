use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    models::{bar::Bar, timeframe::TimeFrame},
    providers::session::{ExchangeZone, session_midnight_utc},
};

#[derive(Deserialize, Debug)]
pub struct ChartEnvelope {
    pub chart: ChartBody,
}

#[derive(Deserialize, Debug)]
pub struct ChartBody {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
pub struct ChartError {
    pub code: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChartResult {
    pub meta: ChartMeta,
    /// Absent when the requested range holds no bars.
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: ChartIndicators,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: String,
    pub exchange_timezone_name: Option<String>,
    pub gmtoffset: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ChartIndicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
    #[serde(default)]
    pub adjclose: Vec<AdjClose>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct AdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten().filter(|v| v.is_finite())
}

impl ChartResult {
    /// Converts the column-oriented payload into bars.
    ///
    /// Rows without a finite close are dropped. Daily and longer bars are keyed
    /// by the exchange-local session date at midnight UTC.
    pub fn into_bars(self, timeframe: &TimeFrame, adjusted: bool) -> Vec<Bar> {
        let zone = ExchangeZone::resolve(
            self.meta.exchange_timezone_name.as_deref(),
            self.meta.gmtoffset,
        );
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();
        let adjclose = self
            .indicators
            .adjclose
            .into_iter()
            .next()
            .map(|a| a.adjclose)
            .unwrap_or_default();

        let mut bars = Vec::with_capacity(self.timestamp.len());
        for (i, &secs) in self.timestamp.iter().enumerate() {
            let Some(raw_close) = at(&quote.close, i) else {
                continue;
            };
            let Some(ts) = DateTime::<Utc>::from_timestamp(secs, 0) else {
                continue;
            };
            let timestamp = if timeframe.is_intraday() {
                ts
            } else {
                session_midnight_utc(ts, zone)
            };

            // Scale OHLC so the bar stays internally consistent with the adjusted close.
            let (close, factor) = match at(&adjclose, i) {
                Some(adj) if adjusted && raw_close != 0.0 => (adj, adj / raw_close),
                _ => (raw_close, 1.0),
            };

            bars.push(Bar {
                timestamp,
                open: at(&quote.open, i).map(|v| v * factor),
                high: at(&quote.high, i).map(|v| v * factor),
                low: at(&quote.low, i).map(|v| v * factor),
                close,
                volume: at(&quote.volume, i),
                trade_count: None,
                vwap: None,
            });
        }
        bars
    }
}
