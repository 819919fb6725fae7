//! Ticker-list loading.
//!
//! The list is JSON in one of two shapes:
//!
//! ```json
//! ["SPY", "QQQ", "TQQQ"]
//! ```
//!
//! ```json
//! { "tickers": ["SPY", "QQQ", "TQQQ"] }
//! ```
//!
//! Symbols are trimmed and uppercased; empties and duplicates are dropped,
//! keeping the first occurrence.

use std::{collections::HashSet, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TickerListError {
    #[error("cannot read ticker list {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("ticker list {origin} is not a JSON list or an object with a \"tickers\" list: {source}")]
    Parse {
        origin: String,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TickerFile {
    List(Vec<String>),
    Object { tickers: Vec<String> },
}

/// What [`normalize_tickers`] changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickerNormalization {
    /// Symbols altered by trimming or uppercasing.
    pub rewritten: usize,
    pub empty_dropped: usize,
    pub duplicates_dropped: usize,
}

/// Trims, uppercases and dedupes, preserving first-occurrence order.
pub fn normalize_tickers(raw: Vec<String>) -> (Vec<String>, TickerNormalization) {
    let mut report = TickerNormalization::default();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for symbol in raw {
        let norm = symbol.trim().to_uppercase();
        if norm.is_empty() {
            report.empty_dropped += 1;
            continue;
        }
        if norm != symbol {
            report.rewritten += 1;
        }
        if seen.insert(norm.clone()) {
            out.push(norm);
        } else {
            report.duplicates_dropped += 1;
        }
    }
    (out, report)
}

/// Parses and normalizes a ticker list from a JSON string.
pub fn parse_tickers_str(json: &str) -> Result<Vec<String>, TickerListError> {
    parse_with_origin(json, "<inline>")
}

fn parse_with_origin(json: &str, origin: &str) -> Result<Vec<String>, TickerListError> {
    let file: TickerFile =
        serde_json::from_str(json).map_err(|source| TickerListError::Parse {
            origin: origin.to_string(),
            source,
        })?;
    let raw = match file {
        TickerFile::List(list) => list,
        TickerFile::Object { tickers } => tickers,
    };
    let (tickers, report) = normalize_tickers(raw);
    debug!(origin, count = tickers.len(), ?report, "loaded ticker list");
    Ok(tickers)
}

/// Reads a ticker list file; see the module docs for the accepted shapes.
pub fn load_tickers(path: impl AsRef<Path>) -> Result<Vec<String>, TickerListError> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| TickerListError::Read {
        path: origin.clone(),
        source,
    })?;
    parse_with_origin(&text, &origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_shapes() {
        assert_eq!(parse_tickers_str(r#"["spy", "QQQ"]"#).unwrap(), vec!["SPY", "QQQ"]);
        assert_eq!(
            parse_tickers_str(r#"{"tickers": ["tqqq"]}"#).unwrap(),
            vec!["TQQQ"]
        );
    }

    #[test]
    fn normalization_counts_changes() {
        let raw = [" spy", "SPY", "", "  ", "qqq", "QQQ", "IWM"]
            .map(String::from)
            .to_vec();
        let (tickers, report) = normalize_tickers(raw);

        assert_eq!(tickers, vec!["SPY", "QQQ", "IWM"]);
        assert_eq!(
            report,
            TickerNormalization {
                rewritten: 2,
                empty_dropped: 2,
                duplicates_dropped: 2,
            }
        );
    }

    #[test]
    fn wrong_shapes_are_errors() {
        for bad in [r#"{"symbols": ["SPY"]}"#, r#""SPY""#, "[1, 2]", "not json", ""] {
            assert!(
                matches!(parse_tickers_str(bad), Err(TickerListError::Parse { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tickers(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, TickerListError::Read { .. }));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn empty_list_is_valid() {
        assert!(parse_tickers_str("[]").unwrap().is_empty());
    }
}
