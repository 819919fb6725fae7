//! Vendor-agnostic price history models and the providers that fill them.
//!
//! Everything downstream (the indicator cache, charts, signal reports) speaks
//! in terms of [`models::bar_series::BarSeries`]; every market data vendor is
//! hidden behind [`providers::DataProvider`].

pub mod models;
pub mod providers;
