// File: crates/chart-prep/src/timezone.rs
// Summary: Timestamp parsing/normalization and display-timezone label formatting.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PrepError;
use crate::types::LabelGranularity;

const FMT_TIME: &str = "%H:%M";
const FMT_DAY_TIME: &str = "%m-%d %H:%M";
const FMT_DAY: &str = "%m-%d";
const FMT_MONTH: &str = "%Y-%m";
const FMT_HOVER: &str = "%Y-%m-%d %H:%M";
const FMT_CANONICAL: &str = "%Y-%m-%dT%H:%M:%S%:z";

// Backend payloads mix `Z`, `+HH:MM` and `+HHMM` notations.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
];
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parse a payload timestamp into an offset-aware instant.
/// Naive timestamps (no offset) are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Parse a payload timestamp straight to epoch milliseconds.
pub fn parse_epoch_millis(raw: &str) -> Option<i64> {
    parse_timestamp(raw).map(|dt| dt.timestamp_millis())
}

/// Canonical explicit-UTC-offset rendering (`YYYY-MM-DDTHH:MM:SS+00:00`).
pub fn canonical_utc(epoch_ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.fixed_offset().format(FMT_CANONICAL).to_string())
}

/// Normalize any accepted notation to the canonical UTC form.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    parse_epoch_millis(raw).and_then(canonical_utc)
}

/// Timezone labels are rendered in. Passed explicitly into axis building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayTimezone {
    #[default]
    Utc,
    Local,
    /// Fixed offset east of UTC, in seconds.
    Fixed(i32),
}

impl DisplayTimezone {
    /// Format a UTC epoch-ms instant for a tick label at `granularity`.
    pub fn format_label(&self, epoch_ms: i64, granularity: LabelGranularity) -> Option<String> {
        let fmt = match granularity {
            LabelGranularity::Time => FMT_TIME,
            LabelGranularity::DayTime => FMT_DAY_TIME,
            LabelGranularity::Day => FMT_DAY,
            LabelGranularity::Month => FMT_MONTH,
        };
        self.format(epoch_ms, fmt)
    }

    /// Full per-sample label used for hover tooltips.
    pub fn format_hover(&self, epoch_ms: i64) -> Option<String> {
        self.format(epoch_ms, FMT_HOVER)
    }

    fn format(&self, epoch_ms: i64, fmt: &str) -> Option<String> {
        DateTime::<Utc>::from_timestamp_millis(epoch_ms)
            .map(|dt| self.with_display_timezone(dt, |zoned| zoned.format(fmt).to_string()))
    }

    /// Converts a UTC instant into the display timezone and normalizes it to
    /// `DateTime<FixedOffset>` so formatting works on one concrete type.
    fn with_display_timezone<T>(
        &self,
        datetime: DateTime<Utc>,
        formatter: impl FnOnce(DateTime<FixedOffset>) -> T,
    ) -> T {
        let zoned = match self {
            DisplayTimezone::Utc => datetime.fixed_offset(),
            DisplayTimezone::Local => datetime.with_timezone(&chrono::Local).fixed_offset(),
            DisplayTimezone::Fixed(secs) => match FixedOffset::east_opt(*secs) {
                Some(offset) => datetime.with_timezone(&offset),
                None => datetime.fixed_offset(),
            },
        };
        formatter(zoned)
    }
}

impl fmt::Display for DisplayTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayTimezone::Utc => write!(f, "UTC"),
            DisplayTimezone::Local => write!(f, "Local"),
            DisplayTimezone::Fixed(secs) => {
                let sign = if *secs < 0 { '-' } else { '+' };
                let abs = secs.abs();
                write!(f, "{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
            }
        }
    }
}

impl FromStr for DisplayTimezone {
    type Err = PrepError;

    /// Accepts `UTC`, `Local`, `+07:00`, `-0500`, `UTC+7`, `UTC-05:30`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "utc" | "z" | "gmt" => return Ok(DisplayTimezone::Utc),
            "local" => return Ok(DisplayTimezone::Local),
            _ => {}
        }
        let body = lowered
            .strip_prefix("utc")
            .or_else(|| lowered.strip_prefix("gmt"))
            .unwrap_or(&lowered);
        parse_offset(body).ok_or_else(|| PrepError::UnknownTimezone(s.to_string()))
    }
}

fn parse_offset(body: &str) -> Option<DisplayTimezone> {
    let (sign, rest) = match body.chars().next()? {
        '+' => (1, &body[1..]),
        '-' => (-1, &body[1..]),
        _ => return None,
    };
    if !rest.is_ascii() {
        return None;
    }
    let (h, m) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(h) || !digits(m) {
        return None;
    }
    let hours: i32 = h.parse().ok()?;
    let minutes: i32 = m.parse().ok()?;
    if minutes >= 60 || hours > 14 {
        return None;
    }
    let secs = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(secs).map(|_| DisplayTimezone::Fixed(secs))
}

impl Serialize for DisplayTimezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DisplayTimezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
