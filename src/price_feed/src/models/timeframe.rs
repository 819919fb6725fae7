//! Bar interval model (`amount × unit`) shared by providers and the cache.
//!
//! A [`TimeFrame`] is validated on construction and round-trips through a
//! compact string form used in config files and logs:
//!
//! | string | meaning     |
//! |--------|-------------|
//! | `15m`  | 15 minutes  |
//! | `1h`   | 1 hour      |
//! | `1d`   | 1 day       |
//! | `1w`   | 1 week      |
//! | `3mo`  | 3 months    |

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeFrameError {
    #[error("Invalid amount for {unit:?}: {message}")]
    InvalidAmount {
        unit: TimeFrameUnit,
        message: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeFrameUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeFrame {
    pub amount: u32,
    pub unit: TimeFrameUnit,
}

impl TimeFrame {
    pub fn new(amount: u32, unit: TimeFrameUnit) -> Result<Self, TimeFrameError> {
        Self::validate(amount, unit)?;
        Ok(Self { amount, unit })
    }

    pub const fn day() -> Self {
        Self {
            amount: 1,
            unit: TimeFrameUnit::Day,
        }
    }

    pub const fn hour() -> Self {
        Self {
            amount: 1,
            unit: TimeFrameUnit::Hour,
        }
    }

    fn validate(amount: u32, unit: TimeFrameUnit) -> Result<(), TimeFrameError> {
        match unit {
            TimeFrameUnit::Minute if !(1..=59).contains(&amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Minute units can only be used with amounts between 1-59".into(),
                })
            }
            TimeFrameUnit::Hour if !(1..=23).contains(&amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Hour units can only be used with amounts 1-23".into(),
                })
            }
            TimeFrameUnit::Day | TimeFrameUnit::Week if amount != 1 => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Day and Week units can only be used with amount 1".into(),
                })
            }
            TimeFrameUnit::Month if ![1, 2, 3, 6, 12].contains(&amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Month units can only be used with amount 1, 2, 3, 6 and 12".into(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Minute and hour bars; these carry a wall-clock time, not just a date.
    pub fn is_intraday(&self) -> bool {
        matches!(self.unit, TimeFrameUnit::Minute | TimeFrameUnit::Hour)
    }

    /// The timestamp one interval after `ts`. Months are calendar months.
    pub fn advance(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let amount = i64::from(self.amount);
        match self.unit {
            TimeFrameUnit::Minute => ts + Duration::minutes(amount),
            TimeFrameUnit::Hour => ts + Duration::hours(amount),
            TimeFrameUnit::Day => ts + Duration::days(amount),
            TimeFrameUnit::Week => ts + Duration::weeks(amount),
            TimeFrameUnit::Month => ts
                .checked_add_months(Months::new(self.amount))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl Default for TimeFrame {
    fn default() -> Self {
        Self::day()
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TimeFrameUnit::Minute => "m",
            TimeFrameUnit::Hour => "h",
            TimeFrameUnit::Day => "d",
            TimeFrameUnit::Week => "w",
            TimeFrameUnit::Month => "mo",
        };
        write!(f, "{}{unit}", self.amount)
    }
}

impl FromStr for TimeFrame {
    type Err = TimeFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TimeFrameError::InvalidInput {
                message: format!("timeframe '{s}' has no unit"),
            })?;
        let (digits, unit) = s.split_at(split);
        let amount: u32 = if digits.is_empty() {
            1
        } else {
            digits.parse().map_err(|_| TimeFrameError::InvalidInput {
                message: format!("timeframe '{s}' has an invalid amount"),
            })?
        };
        // "M" alone is month, everything else is case-insensitive.
        let unit = match unit {
            "M" => TimeFrameUnit::Month,
            other => match other.to_ascii_lowercase().as_str() {
                "m" | "min" | "minute" => TimeFrameUnit::Minute,
                "h" | "hr" | "hour" => TimeFrameUnit::Hour,
                "d" | "day" => TimeFrameUnit::Day,
                "w" | "wk" | "week" => TimeFrameUnit::Week,
                "mo" | "month" => TimeFrameUnit::Month,
                _ => {
                    return Err(TimeFrameError::InvalidInput {
                        message: format!("Invalid timeframe unit: {unit}"),
                    });
                }
            },
        };
        TimeFrame::new(amount, unit)
    }
}

impl Serialize for TimeFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
