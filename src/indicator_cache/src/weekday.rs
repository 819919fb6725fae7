//! Day-of-week rise/fall statistics over close-to-close returns.

use std::fmt;

use chrono::{Datelike, Weekday};
use price_feed::models::bar_series::BarSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct WeekdayRow {
    pub weekday: Weekday,
    /// Bars on this weekday, including the first bar of the series.
    pub total: usize,
    pub rising: usize,
    pub falling: usize,
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

impl WeekdayRow {
    /// Share of rising days, in percent, rounded to two decimals.
    pub fn rise_pct(&self) -> f64 {
        pct(self.rising, self.total)
    }

    pub fn fall_pct(&self) -> f64 {
        pct(self.falling, self.total)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekdayStats {
    pub ticker: String,
    /// Monday first; weekdays without bars are omitted.
    pub rows: Vec<WeekdayRow>,
}

impl WeekdayStats {
    /// Highest fall percentage; the earlier weekday wins a tie.
    pub fn most_likely_to_fall(&self) -> Option<&WeekdayRow> {
        best_by(&self.rows, WeekdayRow::fall_pct)
    }

    pub fn most_likely_to_rise(&self) -> Option<&WeekdayRow> {
        best_by(&self.rows, WeekdayRow::rise_pct)
    }
}

fn best_by(rows: &[WeekdayRow], key: fn(&WeekdayRow) -> f64) -> Option<&WeekdayRow> {
    rows.iter().fold(None, |best, row| match best {
        Some(b) if key(b) >= key(row) => Some(b),
        _ => Some(row),
    })
}

/// Counts rising and falling sessions per weekday.
///
/// The return of bar `i` is `close[i] / close[i−1] − 1`; the first bar has no
/// return and only counts towards its weekday's total.
pub fn weekday_stats(series: &BarSeries) -> WeekdayStats {
    let mut rows: Vec<WeekdayRow> = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
    .map(|weekday| WeekdayRow {
        weekday,
        total: 0,
        rising: 0,
        falling: 0,
    })
    .collect();

    let mut prev: Option<f64> = None;
    for bar in &series.bars {
        let row = &mut rows[bar.timestamp.weekday().num_days_from_monday() as usize];
        row.total += 1;
        if let Some(p) = prev {
            let ret = bar.close / p - 1.0;
            if ret > 0.0 {
                row.rising += 1;
            } else if ret < 0.0 {
                row.falling += 1;
            }
        }
        prev = Some(bar.close);
    }

    rows.retain(|r| r.total > 0);
    WeekdayStats {
        ticker: series.symbol.clone(),
        rows,
    }
}

impl fmt::Display for WeekdayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} - Day of Week Analysis", self.ticker)?;
        writeln!(
            f,
            "{:<10} {:>6} {:>7} {:>7} {:>8} {:>8}",
            "Day", "Total", "Rising", "Falling", "Rise %", "Fall %"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<10} {:>6} {:>7} {:>7} {:>8.2} {:>8.2}",
                weekday_name(row.weekday),
                row.total,
                row.rising,
                row.falling,
                row.rise_pct(),
                row.fall_pct()
            )?;
        }
        if let Some(row) = self.most_likely_to_fall() {
            writeln!(
                f,
                "Most likely to fall: {} ({:.2}%)",
                weekday_name(row.weekday),
                row.fall_pct()
            )?;
        }
        if let Some(row) = self.most_likely_to_rise() {
            writeln!(
                f,
                "Most likely to rise: {} ({:.2}%)",
                weekday_name(row.weekday),
                row.rise_pct()
            )?;
        }
        Ok(())
    }
}

pub(crate) fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
