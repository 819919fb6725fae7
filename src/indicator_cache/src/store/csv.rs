use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use indexmap::IndexMap;
use price_feed::models::{bar::Bar, bar_series::BarSeries, timeframe::TimeFrame};
use tracing::{debug, warn};

use super::{PriceTable, SeriesStore, StoreError, validate_ticker};
use crate::indicators::IndicatorSet;

const PRICE_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// One `<TICKER>.csv` per ticker under `dir`.
///
/// Timestamps are written as RFC 3339 UTC and floats with the shortest
/// representation that parses back to the same bits, so a reload continues
/// the recursive indicators exactly. Saves go through a `.tmp` file and a
/// rename.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
    timeframe: TimeFrame,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>, timeframe: TimeFrame) -> Self {
        Self {
            dir: dir.into(),
            timeframe,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, ticker: &str) -> Result<PathBuf, StoreError> {
        validate_ticker(ticker)?;
        Ok(self.dir.join(format!("{ticker}.csv")))
    }
}

/// Parses the timestamp formats found in price tables.
///
/// Accepts RFC 3339 (`2024-01-02T00:00:00Z`), `2024-01-02 00:00:00+00:00`,
/// a naive `2024-01-02 00:00:00` (read as UTC) and a bare date (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_float(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => String::new(),
    }
}

struct Layout {
    timestamp: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    volume: Option<usize>,
    derived: Vec<(usize, String)>,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self, String> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let timestamp = find("timestamp")
            .or_else(|| find("date"))
            .ok_or("missing timestamp column")?;
        let close = find("close").ok_or("missing close column")?;

        let derived = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                *i != timestamp
                    && !PRICE_COLUMNS
                        .iter()
                        .any(|p| h.trim().eq_ignore_ascii_case(p))
            })
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();

        Ok(Self {
            timestamp,
            close,
            open: find("open"),
            high: find("high"),
            low: find("low"),
            volume: find("volume"),
            derived,
        })
    }
}

fn optional_float(record: &StringRecord, idx: Option<usize>) -> Result<Option<f64>, String> {
    let Some(raw) = idx.and_then(|i| record.get(i)).map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| format!("not a number: {raw:?}"))
}

impl SeriesStore for CsvStore {
    fn load(&self, ticker: &str) -> Result<Option<PriceTable>, StoreError> {
        let path = self.path_for(ticker)?;
        if !path.exists() {
            return Ok(None);
        }
        let malformed = |message: String| StoreError::Malformed {
            path: path.clone(),
            message,
        };

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?;
        let headers = reader
            .headers()
            .map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?
            .clone();
        let layout = Layout::from_headers(&headers).map_err(malformed)?;

        let mut bars = Vec::new();
        let mut derived: IndexMap<String, Vec<Option<f64>>> = layout
            .derived
            .iter()
            .map(|(_, name)| (name.clone(), Vec::new()))
            .collect();

        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?;
            // header is line 1
            let line = row + 2;
            let raw_ts = record.get(layout.timestamp).unwrap_or_default();
            let timestamp = parse_timestamp(raw_ts)
                .ok_or_else(|| malformed(format!("line {line}: bad timestamp {raw_ts:?}")))?;
            let close = optional_float(&record, Some(layout.close))
                .map_err(|m| malformed(format!("line {line}: close {m}")))?
                .filter(|c| c.is_finite())
                .ok_or_else(|| malformed(format!("line {line}: missing close")))?;

            let field = |idx: Option<usize>, name: &str| {
                optional_float(&record, idx).map_err(|m| malformed(format!("line {line}: {name} {m}")))
            };
            bars.push(Bar {
                timestamp,
                open: field(layout.open, "open")?,
                high: field(layout.high, "high")?,
                low: field(layout.low, "low")?,
                close,
                volume: field(layout.volume, "volume")?,
                trade_count: None,
                vwap: None,
            });
            for ((idx, name), values) in layout.derived.iter().zip(derived.values_mut()) {
                values.push(field(Some(*idx), name)?);
            }
        }

        let mut series = BarSeries::with_bars(ticker, self.timeframe, bars);
        if !series.is_canonical() {
            let dropped = series.canonicalize();
            // derived rows no longer line up with the reordered bars
            derived.clear();
            warn!(
                ticker,
                path = %path.display(),
                dropped,
                "price table had out-of-order or duplicate timestamps; kept the last occurrence"
            );
        }
        debug!(ticker, rows = series.len(), "loaded price table");
        Ok(Some(PriceTable { series, derived }))
    }

    fn save(&self, series: &BarSeries, indicators: &IndicatorSet) -> Result<PathBuf, StoreError> {
        let path = self.path_for(&series.symbol)?;
        let columns = indicators.columns();
        for (name, values) in &columns {
            if values.len() != series.len() {
                return Err(StoreError::ColumnLength {
                    column: name.clone(),
                    expected: series.len(),
                    actual: values.len(),
                });
            }
        }

        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let tmp = path.with_extension("csv.tmp");
        let csv_err = |source: csv::Error| StoreError::Csv {
            path: tmp.clone(),
            source,
        };

        let mut writer = WriterBuilder::new().from_path(&tmp).map_err(csv_err)?;
        let header = PRICE_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(columns.iter().map(|(name, _)| name.clone()));
        writer.write_record(header).map_err(csv_err)?;

        for (i, bar) in series.bars.iter().enumerate() {
            let mut row = vec![
                bar.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                format_float(bar.open),
                format_float(bar.high),
                format_float(bar.low),
                format_float(Some(bar.close)),
                format_float(bar.volume),
            ];
            row.extend(columns.iter().map(|(_, values)| format_float(values[i])));
            writer.write_record(&row).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        drop(writer);

        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(ticker = %series.symbol, rows = series.len(), path = %path.display(), "saved price table");
        Ok(path)
    }

    fn list_tickers(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "csv") && path.is_file() {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if validate_ticker(stem).is_ok() {
                        tickers.push(stem.to_string());
                    }
                }
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_all_supported_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        for s in [
            "2024-01-02T00:00:00Z",
            "2024-01-02T00:00:00+00:00",
            "2024-01-02 00:00:00+00:00",
            "2024-01-02 00:00:00",
            "2024-01-02",
            " 2024-01-02 ",
        ] {
            assert_eq!(parse_timestamp(s), Some(expected), "{s}");
        }
        assert_eq!(
            parse_timestamp("2024-01-02T09:30:00-05:00"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap())
        );
        assert_eq!(parse_timestamp("Ticker"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn floats_round_trip_through_text() {
        for v in [0.1 + 0.2, 1.0 / 3.0, 123456.789e-12, 4.5e15, -0.000123] {
            let text = format_float(Some(v));
            assert_eq!(text.parse::<f64>().unwrap().to_bits(), v.to_bits(), "{text}");
        }
        assert_eq!(format_float(None), "");
        assert_eq!(format_float(Some(f64::NAN)), "");
    }
}
