//! Alpaca market data v2 (`/v2/stocks/bars`). Requires API keys in the environment.

pub mod params;
pub mod provider;
pub mod response;
