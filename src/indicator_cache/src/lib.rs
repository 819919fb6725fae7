//! Incremental price cache with derived technical indicators.
//!
//! For every ticker the crate keeps one table of daily (or intraday) bars on
//! disk, extends it with only the bars that are new since the last run, and
//! recomputes EMA, RSI and MACD over the full history so a recursive
//! indicator never restarts from a truncated window. On top of the table it
//! reports EMA crossover signals, renders signal charts and summarizes
//! weekday behaviour.
//!
//! The pieces, in pipeline order:
//! - [`tickers`]: load the JSON ticker list
//! - [`store`]: read and atomically rewrite `<TICKER>.csv`
//! - [`sync`]: decide what to fetch and merge it into the stored bars
//! - [`indicators`]: EMA / RSI / MACD over a whole series
//! - [`signals`]: crossover detection within a lookback window
//! - [`chart`]: render a signal chart through a [`chart::ChartSink`]
//! - [`batch`]: run the above for each ticker and collect a summary

pub mod batch;
pub mod chart;
pub mod config;
pub mod indicators;
pub mod signals;
pub mod store;
pub mod sync;
pub mod tickers;
pub mod weekday;
