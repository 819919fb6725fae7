//! Yahoo Finance chart API (`/v8/finance/chart`). Public, no credentials.

pub mod params;
pub mod provider;
pub mod response;
