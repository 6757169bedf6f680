// File: crates/chart-prep/src/types.rs
// Summary: Shared types and constants (time units, view periods, sampling intervals).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PrepError;

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;
pub const WEEK_MS: i64 = 7 * DAY_MS;
/// Nominal month width; bucketing is epoch-aligned, not calendar-aware.
pub const MONTH_MS: i64 = 30 * DAY_MS;

/// Requested look-back window of a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "max")]
    Max,
}

/// Cache lifetime class of a period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtlClass {
    Short,
    Medium,
    Long,
}

/// How much of each timestamp a tick label shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelGranularity {
    /// `HH:mm`
    Time,
    /// `MM-DD HH:mm`
    DayTime,
    /// `MM-DD`
    Day,
    /// `YYYY-MM`
    Month,
}

impl Period {
    pub const ALL: [Period; 11] = [
        Period::OneDay,
        Period::FiveDays,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::YearToDate,
        Period::OneYear,
        Period::TwoYears,
        Period::FiveYears,
        Period::TenYears,
        Period::Max,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::YearToDate => "ytd",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::Max => "max",
        }
    }

    pub const fn ttl_class(&self) -> TtlClass {
        match self {
            Period::OneDay => TtlClass::Short,
            Period::FiveDays | Period::OneMonth => TtlClass::Medium,
            _ => TtlClass::Long,
        }
    }

    /// Only the single-trading-day view keeps true chronological spacing.
    pub const fn is_single_day(&self) -> bool {
        matches!(self, Period::OneDay)
    }

    pub const fn label_granularity(&self) -> LabelGranularity {
        match self {
            Period::OneDay => LabelGranularity::Time,
            Period::FiveDays => LabelGranularity::DayTime,
            Period::OneMonth | Period::ThreeMonths | Period::SixMonths | Period::YearToDate => {
                LabelGranularity::Day
            }
            Period::OneYear
            | Period::TwoYears
            | Period::FiveYears
            | Period::TenYears
            | Period::Max => LabelGranularity::Month,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let want = s.trim().to_ascii_lowercase();
        Period::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == want)
            .ok_or_else(|| PrepError::UnknownPeriod(s.to_string()))
    }
}

/// Fixed-width sampling interval, stored in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    millis: i64,
}

impl Interval {
    /// Contract: `millis > 0`.
    pub fn from_millis(millis: i64) -> Option<Self> {
        (millis > 0).then_some(Self { millis })
    }

    pub const fn minutes(n: i64) -> Self {
        Self { millis: n * MINUTE_MS }
    }

    pub const fn as_millis(&self) -> i64 {
        self.millis
    }

    pub const fn is_intraday(&self) -> bool {
        self.millis < DAY_MS
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.millis;
        if m % MONTH_MS == 0 {
            write!(f, "{}mo", m / MONTH_MS)
        } else if m % WEEK_MS == 0 {
            write!(f, "{}wk", m / WEEK_MS)
        } else if m % DAY_MS == 0 {
            write!(f, "{}d", m / DAY_MS)
        } else if m % HOUR_MS == 0 {
            write!(f, "{}h", m / HOUR_MS)
        } else if m % MINUTE_MS == 0 {
            write!(f, "{}m", m / MINUTE_MS)
        } else {
            write!(f, "{}ms", m)
        }
    }
}

impl FromStr for Interval {
    type Err = PrepError;

    /// Accepts `<n><unit>` with unit one of `m`, `h`, `d`, `wk`, `mo` (e.g. `15m`, `1wk`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
        let (num, unit) = raw.split_at(split);
        let n: i64 = num.parse().map_err(|_| PrepError::UnknownInterval(s.to_string()))?;
        let unit_ms = match unit {
            "m" => MINUTE_MS,
            "h" => HOUR_MS,
            "d" => DAY_MS,
            "wk" => WEEK_MS,
            "mo" => MONTH_MS,
            _ => return Err(PrepError::UnknownInterval(s.to_string())),
        };
        n.checked_mul(unit_ms)
            .and_then(Interval::from_millis)
            .ok_or_else(|| PrepError::UnknownInterval(s.to_string()))
    }
}

impl Serialize for Interval {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
