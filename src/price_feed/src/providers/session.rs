//! Session-date normalization for daily and longer bars.
//!
//! Vendors stamp a daily bar with the session open (Yahoo, e.g. `13:30Z`) or
//! with local midnight (Alpaca, e.g. `04:00Z`). The cache keys bars by
//! timestamp, so both are mapped to midnight UTC of the exchange-local date.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// The exchange time zone of a bar stream.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ExchangeZone {
    Named(Tz),
    Offset(FixedOffset),
}

impl ExchangeZone {
    /// Resolves an IANA name, falling back to a fixed offset in seconds, then UTC.
    pub(crate) fn resolve(name: Option<&str>, gmtoffset: Option<i64>) -> Self {
        if let Some(tz) = name.and_then(|n| n.parse::<Tz>().ok()) {
            return Self::Named(tz);
        }
        let offset = gmtoffset
            .and_then(|secs| i32::try_from(secs).ok())
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self::Offset(offset)
    }

    pub(crate) fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Named(tz) => tz.from_utc_datetime(&ts.naive_utc()).date_naive(),
            Self::Offset(off) => off.from_utc_datetime(&ts.naive_utc()).date_naive(),
        }
    }
}

/// Midnight UTC of the exchange-local date `ts` falls on.
pub(crate) fn session_midnight_utc(ts: DateTime<Utc>, zone: ExchangeZone) -> DateTime<Utc> {
    zone.local_date(ts).and_time(NaiveTime::MIN).and_utc()
}
