// File: crates/chart-prep/src/resample.rs
// Summary: Fixed-width, epoch-aligned OHLCV bucket aggregation.

use crate::anomaly::AnomalyEvent;
use crate::indicators::{bollinger, IndicatorParams};
use crate::series::Series;
use crate::types::Interval;

/// Bucket key of a timestamp: `floor(ts / interval) * interval`.
/// `None` when the floored key does not fit in an `i64`.
#[inline]
pub fn bucket_key(ts: i64, interval_ms: i64) -> Option<i64> {
    ts.div_euclid(interval_ms).checked_mul(interval_ms)
}

#[derive(Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, v: Option<f64>) {
        if let Some(v) = v {
            self.sum += v;
            self.count += 1;
        }
    }
    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Accumulator for one bucket; consumed once its source samples are exhausted.
struct Bucket {
    key: i64,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
    vwap: Mean,
    rsi: Mean,
}

impl Bucket {
    fn new(key: i64) -> Self {
        Self {
            key,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            vwap: Mean::default(),
            rsi: Mean::default(),
        }
    }

    fn absorb(&mut self, s: &Series, i: usize) {
        let close = s.close[i];
        if self.open.is_none() {
            self.open = s.open[i];
        }
        if let Some(h) = s.high[i].or(close) {
            self.high = Some(self.high.map_or(h, |cur| cur.max(h)));
        }
        if let Some(l) = s.low[i].or(close) {
            self.low = Some(self.low.map_or(l, |cur| cur.min(l)));
        }
        if close.is_some() {
            self.close = close;
        }
        if let Some(v) = s.volume.as_ref().and_then(|col| col[i]) {
            self.volume = Some(self.volume.unwrap_or(0.0) + v);
        }
        self.vwap.push(s.vwap.as_ref().and_then(|col| col[i]));
        self.rsi.push(s.rsi.as_ref().and_then(|col| col[i]));
    }

    fn emit(self, out: &mut Series) {
        out.timestamps.push(self.key);
        out.open.push(self.open);
        out.high.push(self.high);
        out.low.push(self.low);
        out.close.push(self.close);
        if let Some(col) = out.volume.as_mut() {
            col.push(self.volume);
        }
        if let Some(col) = out.vwap.as_mut() {
            col.push(self.vwap.value());
        }
        if let Some(col) = out.rsi.as_mut() {
            col.push(self.rsi.value());
        }
    }
}

/// Aggregate `series` into `interval`-wide buckets.
/// For each bucket: open=first available open, high=max high (close as fallback),
/// low=min low (close as fallback), close=last available close, volume=sum,
/// VWAP/RSI=mean of available values. Bollinger Bands are recomputed from the
/// aggregated closes. Anomalies move to the bucket their timestamp floors into.
/// Samples whose bucket key overflows are skipped.
pub fn resample(series: &Series, interval: Interval, params: &IndicatorParams) -> Series {
    let iv = interval.as_millis();
    let n = series.len();
    let mut out = Series {
        volume: series.volume.as_ref().map(|_| Vec::new()),
        vwap: series.vwap.as_ref().map(|_| Vec::new()),
        rsi: series.rsi.as_ref().map(|_| Vec::new()),
        ..Series::default()
    };

    let mut skipped = 0usize;
    let mut i = 0usize;
    while i < n {
        let Some(key) = bucket_key(series.timestamps[i], iv) else {
            skipped += 1;
            i += 1;
            continue;
        };
        let mut bucket = Bucket::new(key);
        let mut j = i;
        while j < n && bucket_key(series.timestamps[j], iv) == Some(key) {
            bucket.absorb(series, j);
            j += 1;
        }
        bucket.emit(&mut out);
        i = j;
    }
    if skipped > 0 {
        log::warn!("skipped {skipped} samples with no {interval} bucket");
    }

    if series.bollinger.is_some() {
        out.bollinger = Some(bollinger(&out.close, params.bollinger_window, params.bollinger_k));
    }

    out.anomalies = series
        .anomalies
        .iter()
        .filter_map(|a| {
            let key = bucket_key(a.timestamp, iv)?;
            out.timestamps.binary_search(&key).ok()?;
            Some(AnomalyEvent { timestamp: key, value: a.value })
        })
        .collect();

    log::debug!("resampled {} samples into {} buckets of {}", n, out.len(), interval);
    out
}

/// True when `interval` is strictly coarser than the series' native resolution.
pub fn needs_resample(series: &Series, interval: Interval) -> bool {
    series.nominal_interval_ms().is_some_and(|native| interval.as_millis() > native)
}
