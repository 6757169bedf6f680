// File: crates/chart-prep/src/series.rs
// Summary: Raw chart payload (wire shape) and the typed columnar series the pipeline works on.
// Notes:
// - `RawSeries` mirrors the backend JSON keys so cached payloads round-trip untouched.
// - `Series` holds epoch-ms timestamps and parallel `Option<f64>` columns; an
//   absent optional column is `None`, a missing value inside a column is `None`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::anomaly::AnomalyEvent;
use crate::error::{PrepError, Result};
use crate::indicators::Bands;
use crate::timezone::parse_epoch_millis;

/// Precomputed Bollinger overlay as shipped by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBollinger {
    #[serde(deserialize_with = "nullable")]
    pub lower: Vec<Option<f64>>,
    #[serde(deserialize_with = "nullable")]
    pub upper: Vec<Option<f64>>,
    #[serde(deserialize_with = "nullable")]
    pub sma: Vec<Option<f64>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAnomalyMarkers {
    #[serde(deserialize_with = "nullable")]
    pub dates: Vec<String>,
    #[serde(rename = "y_values", alias = "values", deserialize_with = "nullable")]
    pub values: Vec<Option<f64>>,
}

/// Chart payload for one symbol. Every present array has the length of `dates`;
/// an empty optional array means the field is absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSeries {
    #[serde(deserialize_with = "nullable")]
    pub dates: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub open: Vec<Option<f64>>,
    #[serde(deserialize_with = "nullable")]
    pub high: Vec<Option<f64>>,
    #[serde(deserialize_with = "nullable")]
    pub low: Vec<Option<f64>>,
    #[serde(deserialize_with = "nullable")]
    pub close: Vec<Option<f64>>,
    #[serde(deserialize_with = "nullable")]
    pub volume: Vec<Option<f64>>,
    #[serde(rename = "VWAP", alias = "vwap", deserialize_with = "nullable")]
    pub vwap: Vec<Option<f64>>,
    #[serde(rename = "RSI", alias = "rsi", deserialize_with = "nullable")]
    pub rsi: Vec<Option<f64>>,
    #[serde(rename = "bollinger_bands", alias = "bollinger", deserialize_with = "nullable")]
    pub bollinger: RawBollinger,
    #[serde(rename = "anomaly_markers", alias = "anomalyMarkers", deserialize_with = "nullable")]
    pub anomaly_markers: RawAnomalyMarkers,
    #[serde(rename = "Ticker", alias = "ticker", skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(rename = "companyName", skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
}

/// `null` decodes to the type's default (empty arrays/blocks).
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl RawSeries {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Check that every present price column matches `dates` in length.
    /// Optional overlay columns are checked by [`RawSeries::optional_column`] instead.
    pub fn validate(&self) -> Result<()> {
        let expected = self.dates.len();
        let columns: [(&'static str, usize); 4] = [
            ("open", self.open.len()),
            ("high", self.high.len()),
            ("low", self.low.len()),
            ("close", self.close.len()),
        ];
        for (field, found) in columns {
            if found != 0 && found != expected {
                return Err(PrepError::LengthMismatch { field, expected, found });
            }
        }
        Ok(())
    }

    /// Whether an optional column can be used: present and aligned with `dates`.
    /// A misaligned column is logged and treated as absent.
    pub fn optional_column(&self, field: &str, column: &[Option<f64>]) -> bool {
        if column.is_empty() {
            return false;
        }
        if column.len() != self.dates.len() {
            log::warn!(
                "ignoring `{field}`: {} entries, expected {}",
                column.len(),
                self.dates.len()
            );
            return false;
        }
        true
    }
}

/// Typed, strictly ascending series at one resolution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Series {
    /// Epoch milliseconds, strictly increasing.
    pub timestamps: Vec<i64>,
    pub open: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub close: Vec<Option<f64>>,
    pub volume: Option<Vec<Option<f64>>>,
    pub vwap: Option<Vec<Option<f64>>>,
    pub rsi: Option<Vec<Option<f64>>>,
    pub bollinger: Option<Bands>,
    pub anomalies: Vec<AnomalyEvent>,
}

/// Last-bar move relative to the previous close.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PriceChange {
    pub change: f64,
    /// Percent; `None` when the previous close is zero.
    pub pct_change: Option<f64>,
}

impl Series {
    /// Convert a validated payload. Samples with unparseable or out-of-order
    /// timestamps are dropped one by one; the rest of the payload survives.
    pub fn from_raw(raw: &RawSeries) -> Result<Self> {
        raw.validate()?;
        let n = raw.dates.len();
        let bands = &raw.bollinger;
        let bands_usable = raw.optional_column("bollinger_bands.sma", &bands.sma)
            && raw.optional_column("bollinger_bands.upper", &bands.upper)
            && raw.optional_column("bollinger_bands.lower", &bands.lower);

        let mut out = Series {
            volume: raw.optional_column("volume", &raw.volume).then(Vec::new),
            vwap: raw.optional_column("VWAP", &raw.vwap).then(Vec::new),
            rsi: raw.optional_column("RSI", &raw.rsi).then(Vec::new),
            bollinger: bands_usable.then(Bands::default),
            ..Series::default()
        };

        let mut skipped = 0usize;
        for i in 0..n {
            let Some(ts) = parse_epoch_millis(&raw.dates[i]) else {
                skipped += 1;
                continue;
            };
            if out.timestamps.last().is_some_and(|&prev| ts <= prev) {
                skipped += 1;
                continue;
            }
            out.timestamps.push(ts);
            out.open.push(value_at(&raw.open, i));
            out.high.push(value_at(&raw.high, i));
            out.low.push(value_at(&raw.low, i));
            out.close.push(value_at(&raw.close, i));
            if let Some(v) = out.volume.as_mut() {
                v.push(value_at(&raw.volume, i));
            }
            if let Some(v) = out.vwap.as_mut() {
                v.push(value_at(&raw.vwap, i));
            }
            if let Some(v) = out.rsi.as_mut() {
                v.push(value_at(&raw.rsi, i));
            }
            if let Some(b) = out.bollinger.as_mut() {
                b.sma.push(value_at(&bands.sma, i));
                b.upper.push(value_at(&bands.upper, i));
                b.lower.push(value_at(&bands.lower, i));
            }
        }
        if skipped > 0 {
            log::warn!("dropped {skipped} of {n} samples with bad or out-of-order timestamps");
        }

        let markers = &raw.anomaly_markers;
        if markers.dates.len() != markers.values.len() {
            log::warn!(
                "anomaly markers have {} dates but {} values; unmatched values read as null",
                markers.dates.len(),
                markers.values.len()
            );
        }
        out.anomalies = markers
            .dates
            .iter()
            .enumerate()
            .filter_map(|(i, date)| {
                let event = AnomalyEvent::parse(date, value_at(&markers.values, i));
                if event.is_none() {
                    log::warn!("skipping anomaly marker with unparseable timestamp `{date}`");
                }
                event
            })
            .collect();
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Native resolution: median of the positive inter-sample deltas.
    pub fn nominal_interval_ms(&self) -> Option<i64> {
        let mut deltas: Vec<i64> =
            self.timestamps.windows(2).map(|w| w[1] - w[0]).filter(|d| *d > 0).collect();
        if deltas.is_empty() {
            return None;
        }
        deltas.sort_unstable();
        Some(deltas[deltas.len() / 2])
    }

    /// Change between the last two available closes.
    pub fn price_change(&self) -> Option<PriceChange> {
        let mut closes = self.close.iter().rev().flatten();
        let last = *closes.next()?;
        let prev = *closes.next()?;
        let change = last - prev;
        let pct_change = (prev != 0.0).then(|| change / prev * 100.0);
        Some(PriceChange { change, pct_change })
    }
}

#[inline]
fn value_at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten().filter(|v| v.is_finite())
}
