// File: crates/chart-prep/src/indicators.rs
// Summary: Pure indicator math over nullable columns (SMA/Bollinger, EMA, MACD, RSI, VWAP)
//          and the fill step that computes whichever enabled overlay the payload lacks.

use serde::{Deserialize, Serialize};

use crate::series::Series;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Bands {
    pub sma: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Macd {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Bollinger,
    Macd,
    Rsi,
    Vwap,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 4] = [
        IndicatorKind::Bollinger,
        IndicatorKind::Macd,
        IndicatorKind::Rsi,
        IndicatorKind::Vwap,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub bollinger_window: usize,
    /// Band half-width in population standard deviations.
    pub bollinger_k: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            bollinger_window: 20,
            bollinger_k: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
        }
    }
}

/// Trailing mean over up to `window` valid samples ending at each index.
/// Shorter at the start; never looks ahead.
pub fn sma(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let w = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(w);
            let (sum, count) = values[start..=i]
                .iter()
                .flatten()
                .fold((0.0f64, 0usize), |(s, c), v| (s + v, c + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

/// Bollinger Bands: trailing mean ± `k` population standard deviations.
pub fn bollinger(closes: &[Option<f64>], window: usize, k: f64) -> Bands {
    let w = window.max(1);
    let n = closes.len();
    let mut bands = Bands {
        sma: Vec::with_capacity(n),
        upper: Vec::with_capacity(n),
        lower: Vec::with_capacity(n),
    };
    for i in 0..n {
        let start = (i + 1).saturating_sub(w);
        let valid: Vec<f64> = closes[start..=i].iter().flatten().copied().collect();
        if valid.is_empty() {
            bands.sma.push(None);
            bands.upper.push(None);
            bands.lower.push(None);
            continue;
        }
        let count = valid.len() as f64;
        let mean = valid.iter().sum::<f64>() / count;
        let var = valid.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;
        let sd = var.sqrt();
        bands.sma.push(Some(mean));
        bands.upper.push(Some(mean + k * sd));
        bands.lower.push(Some(mean - k * sd));
    }
    bands
}

/// Exponential moving average with `alpha = 2 / (span + 1)`.
/// The first valid value seeds the average directly; null inputs yield null
/// outputs without resetting the running state.
pub fn ema(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut state: Option<f64> = None;
    values
        .iter()
        .map(|v| {
            let x = (*v)?;
            let next = match state {
                None => x,
                Some(prev) => prev + alpha * (x - prev),
            };
            state = Some(next);
            Some(next)
        })
        .collect()
}

pub fn macd(closes: &[Option<f64>], params: &IndicatorParams) -> Macd {
    let fast = ema(closes, params.macd_fast);
    let slow = ema(closes, params.macd_slow);
    let line: Vec<Option<f64>> = fast.iter().zip(&slow).map(|(f, s)| Some((*f)? - (*s)?)).collect();
    let signal = ema(&line, params.macd_signal);
    let histogram = line.iter().zip(&signal).map(|(m, s)| Some((*m)? - (*s)?)).collect();
    Macd { macd: line, signal, histogram }
}

/// Wilder RSI (`alpha = 1 / period`). The first `period` closes carry no value.
pub fn rsi(closes: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let p = period.max(1);
    let alpha = 1.0 / p as f64;
    let mut prev: Option<f64> = None;
    let mut avg: Option<(f64, f64)> = None;
    let mut observed = 0usize;
    let mut out = Vec::with_capacity(closes.len());
    for c in closes {
        let Some(close) = *c else {
            out.push(None);
            continue;
        };
        let mut value = None;
        if let Some(p_close) = prev {
            let delta = close - p_close;
            let (gain, loss) = (delta.max(0.0), (-delta).max(0.0));
            let (g, l) = match avg {
                None => (gain, loss),
                Some((g, l)) => (g + alpha * (gain - g), l + alpha * (loss - l)),
            };
            avg = Some((g, l));
            observed += 1;
            if observed >= p {
                let rs = g / if l == 0.0 { 1e-6 } else { l };
                value = Some(100.0 - 100.0 / (1.0 + rs));
            }
        }
        prev = Some(close);
        out.push(value);
    }
    out
}

/// Cumulative volume-weighted average of closes; null while no volume has traded.
pub fn vwap(closes: &[Option<f64>], volumes: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut cum_pv = 0.0f64;
    let mut cum_v = 0.0f64;
    closes
        .iter()
        .zip(volumes)
        .map(|(c, v)| {
            if let (Some(c), Some(v)) = (c, v) {
                cum_pv += c * v;
                cum_v += v;
            }
            c.filter(|_| cum_v > 0.0).map(|_| cum_pv / cum_v)
        })
        .collect()
}

/// Indicator overlays aligned to a series; `None` means not enabled or not computable.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Overlays {
    pub bollinger: Option<Bands>,
    pub macd: Option<Macd>,
    pub rsi: Option<Vec<Option<f64>>>,
    pub vwap: Option<Vec<Option<f64>>>,
}

/// Keep payload-supplied overlays and compute the enabled ones that are missing.
/// VWAP is omitted when the series carries no volume.
pub fn fill_indicators(
    series: &Series,
    enabled: &[IndicatorKind],
    params: &IndicatorParams,
) -> Overlays {
    let on = |kind| enabled.contains(&kind);
    let closes = &series.close;
    let mut out = Overlays::default();
    if on(IndicatorKind::Bollinger) {
        out.bollinger = Some(
            series
                .bollinger
                .clone()
                .unwrap_or_else(|| bollinger(closes, params.bollinger_window, params.bollinger_k)),
        );
    }
    if on(IndicatorKind::Macd) {
        out.macd = Some(macd(closes, params));
    }
    if on(IndicatorKind::Rsi) {
        out.rsi = Some(series.rsi.clone().unwrap_or_else(|| rsi(closes, params.rsi_period)));
    }
    if on(IndicatorKind::Vwap) {
        out.vwap = match (&series.vwap, &series.volume) {
            (Some(v), _) => Some(v.clone()),
            (None, Some(volume)) if volume.iter().any(Option::is_some) => {
                Some(vwap(closes, volume))
            }
            _ => {
                log::debug!("vwap enabled but series has no volume; omitting");
                None
            }
        };
    }
    out
}
