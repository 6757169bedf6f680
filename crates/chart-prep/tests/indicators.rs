// File: crates/chart-prep/tests/indicators.rs
// Purpose: Indicator numerics (EMA/MACD, bands, RSI, VWAP) and overlay filling.

use chart_prep::indicators::{bollinger, ema, fill_indicators, macd, rsi, sma, vwap};
use chart_prep::{IndicatorKind, IndicatorParams, Series};

fn some(v: &[f64]) -> Vec<Option<f64>> {
    v.iter().copied().map(Some).collect()
}

#[test]
fn ema_of_constant_is_constant() {
    let out = ema(&some(&[5.0; 40]), 12);
    assert!(out.iter().all(|v| *v == Some(5.0)));
}

#[test]
fn macd_of_constant_is_zero() {
    let m = macd(&some(&[42.5; 60]), &IndicatorParams::default());
    for series in [&m.macd, &m.signal, &m.histogram] {
        assert_eq!(series.len(), 60);
        assert!(series.iter().all(|v| *v == Some(0.0)));
    }
}

#[test]
fn ema_skips_nulls_without_reset() {
    let out = ema(&[Some(1.0), None, Some(3.0)], 3);
    assert_eq!(out[0], Some(1.0));
    assert_eq!(out[1], None);
    // alpha = 0.5: 1 + 0.5 * (3 - 1)
    assert_eq!(out[2], Some(2.0));
}

#[test]
fn sma_is_trailing() {
    assert_eq!(sma(&some(&[1.0, 2.0, 3.0, 4.0]), 2), some(&[1.0, 1.5, 2.5, 3.5]));
}

#[test]
fn bollinger_uses_population_deviation() {
    let b = bollinger(&some(&[1.0, 3.0]), 2, 2.0);
    assert_eq!(b.sma[1], Some(2.0));
    assert_eq!(b.upper[1], Some(4.0));
    assert_eq!(b.lower[1], Some(0.0));
}

#[test]
fn bollinger_bands_are_ordered() {
    let closes: Vec<Option<f64>> =
        (0..200).map(|i| Some(100.0 + ((i * 37) % 17) as f64 - 8.0)).collect();
    let b = bollinger(&closes, 20, 2.0);
    for i in 0..closes.len() {
        let (l, m, u) = (b.lower[i].unwrap(), b.sma[i].unwrap(), b.upper[i].unwrap());
        assert!(l <= m && m <= u, "index {i}: {l} {m} {u}");
    }
    let flat = bollinger(&some(&[7.0; 30]), 20, 2.0);
    assert!(flat.upper.iter().zip(&flat.lower).all(|(u, l)| u == l));
}

#[test]
fn rsi_waits_for_period_then_saturates() {
    let rising: Vec<Option<f64>> = (0..30).map(|i| Some(i as f64)).collect();
    let out = rsi(&rising, 14);
    assert!(out[..14].iter().all(Option::is_none));
    let v = out[14].expect("value after 14 deltas");
    assert!(v > 99.9, "got {v}");

    let falling: Vec<Option<f64>> = rising.iter().rev().copied().collect();
    let out = rsi(&falling, 14);
    assert!(out[20].unwrap() < 1e-6);
}

#[test]
fn vwap_is_cumulative() {
    let out = vwap(&some(&[10.0, 20.0, 30.0]), &[Some(0.0), Some(1.0), Some(3.0)]);
    assert_eq!(out[0], None);
    assert_eq!(out[1], Some(20.0));
    assert_eq!(out[2], Some((20.0 + 90.0) / 4.0));
}

#[test]
fn empty_inputs_give_empty_outputs() {
    assert!(ema(&[], 12).is_empty());
    assert!(sma(&[], 5).is_empty());
    assert!(rsi(&[], 14).is_empty());
    assert!(vwap(&[], &[]).is_empty());
    let b = bollinger(&[], 20, 2.0);
    assert!(b.sma.is_empty() && b.upper.is_empty() && b.lower.is_empty());
}

#[test]
fn overlays_prefer_payload_and_skip_vwap_without_volume() {
    let closes = some(&[1.0, 2.0, 3.0, 4.0]);
    let series = Series {
        timestamps: vec![0, 60_000, 120_000, 180_000],
        open: closes.clone(),
        high: closes.clone(),
        low: closes.clone(),
        close: closes.clone(),
        rsi: Some(some(&[50.0; 4])),
        ..Series::default()
    };
    let params = IndicatorParams::default();
    let out = fill_indicators(&series, &IndicatorKind::ALL, &params);
    assert_eq!(out.rsi, Some(some(&[50.0; 4])));
    assert!(out.vwap.is_none());
    let bands = bollinger(&closes, params.bollinger_window, params.bollinger_k);
    assert_eq!(out.bollinger, Some(bands));
    assert!(out.macd.is_some());

    let none = fill_indicators(&series, &[], &params);
    assert!(none.bollinger.is_none() && none.macd.is_none());
    assert!(none.rsi.is_none() && none.vwap.is_none());
}
