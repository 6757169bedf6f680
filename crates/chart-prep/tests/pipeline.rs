// File: crates/chart-prep/tests/pipeline.rs
// Purpose: End-to-end render model assembly plus request outcomes (ready, superseded, unavailable).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chart_prep::types::MINUTE_MS;
use chart_prep::{
    build_render_model, AxisMode, CacheKey, DisplayTimezone, FetchError, IndicatorKind, Interval,
    Period, PrepConfig, PrepError, PrepOutcome, Preparer, RawSeries, SeriesFetcher, ViewConfig,
};
use futures::future::{BoxFuture, FutureExt};
use serde_json::json;
use tokio::sync::Notify;

/// Two sessions of 30-minute bars with an overnight break and one flagged anomaly.
fn two_sessions_json() -> String {
    let mut dates = Vec::new();
    let mut close = Vec::new();
    let mut volume = Vec::new();
    for (day, offset) in [("2024-03-04", "Z"), ("2024-03-05", "+00:00")] {
        for slot in 0..13 {
            let minutes = 9 * 60 + 30 + slot * 30;
            dates.push(format!("{day}T{:02}:{:02}:00{offset}", minutes / 60, minutes % 60));
            close.push(100.0 + slot as f64);
            volume.push(1_000.0);
        }
    }
    json!({
        "Ticker": "msft",
        "companyName": "Microsoft Corporation",
        "dates": dates,
        "open": close,
        "high": close.iter().map(|c| c + 1.0).collect::<Vec<_>>(),
        "low": close.iter().map(|c| c - 1.0).collect::<Vec<_>>(),
        "close": close,
        "volume": volume,
        "anomaly_markers": { "dates": ["2024-03-05T05:00:00-05:00"], "y_values": [null] },
    })
    .to_string()
}

fn minute_payload(n: usize) -> RawSeries {
    let t0 = 1_709_285_400_000i64; // 2024-03-01T09:30:00Z
    RawSeries {
        dates: (0..n)
            .map(|i| chart_prep::timezone::canonical_utc(t0 + i as i64 * MINUTE_MS).unwrap())
            .collect(),
        close: (0..n).map(|i| Some(50.0 + (i % 4) as f64)).collect(),
        volume: vec![Some(10.0); n],
        ..RawSeries::default()
    }
}

#[test]
fn end_to_end_from_json_payload() {
    let raw = RawSeries::from_json(&two_sessions_json()).unwrap();
    let view = ViewConfig::new("msft", Period::FiveDays, Interval::minutes(30))
        .with_indicators(&[IndicatorKind::Bollinger, IndicatorKind::Vwap]);
    let model = build_render_model(&raw, &view, &PrepConfig::default()).unwrap();

    assert_eq!(model.symbol, "MSFT");
    assert!(!model.resampled);
    assert_eq!(model.interval, Interval::minutes(30));
    assert_eq!(model.axis.mode, AxisMode::Ordinal);
    assert_eq!(model.axis.len(), 26);
    assert_eq!(model.series.close.len(), 26);

    // overnight break between the sessions
    assert_eq!(model.gaps.len(), 1);
    assert_eq!((model.gaps[0].from_index, model.gaps[0].to_index), (12, 13));
    assert_eq!(model.gaps[0].from_position, 12.0);

    // 05:00-05:00 == 10:00Z on day two, the 14th sample; value falls back to close
    assert_eq!(model.anomalies.len(), 1);
    assert_eq!(model.anomalies[0].index, 14);
    assert_eq!(model.anomalies[0].value, Some(101.0));

    let overlays = &model.overlays;
    assert_eq!(overlays.bollinger.as_ref().map(|b| b.sma.len()), Some(26));
    assert_eq!(overlays.vwap.as_ref().map(Vec::len), Some(26));
    assert!(overlays.macd.is_none() && overlays.rsi.is_none());

    let summary = model.summary.unwrap();
    assert_eq!(summary.change, 1.0);

    let as_json = serde_json::to_value(&model).unwrap();
    assert_eq!(as_json["axis"]["mode"], "ordinal");
    assert_eq!(as_json["interval"], "30m");
}

#[test]
fn coarser_interval_triggers_resampling() {
    let raw = minute_payload(60);
    let view = ViewConfig::new("spy", Period::OneDay, Interval::minutes(5));
    let model = build_render_model(&raw, &view, &PrepConfig::default()).unwrap();
    assert!(model.resampled);
    assert_eq!(model.axis.len(), 12);
    assert_eq!(model.axis.mode, AxisMode::Literal);
    assert_eq!(model.series.volume.as_ref().unwrap()[0], Some(50.0));
    assert!(model.gaps.is_empty());
}

#[test]
fn misaligned_overlay_column_is_ignored() {
    let mut raw = minute_payload(10);
    raw.vwap = vec![Some(999.0); 9];
    raw.rsi = vec![Some(40.0); 11];
    raw.bollinger.sma = vec![Some(50.0); 3];
    let view = ViewConfig::new("spy", Period::OneDay, Interval::minutes(1))
        .with_indicators(&[IndicatorKind::Bollinger, IndicatorKind::Rsi, IndicatorKind::Vwap]);
    let model = build_render_model(&raw, &view, &PrepConfig::default()).unwrap();

    assert_eq!(model.axis.len(), 10);
    // the bad payload columns are replaced by computed overlays of the right length
    let vwap = model.overlays.vwap.as_ref().expect("vwap recomputed from volume");
    assert_eq!(vwap.len(), 10);
    assert!(vwap.iter().all(|v| *v != Some(999.0)));
    let rsi = model.overlays.rsi.as_ref().unwrap();
    assert_eq!(rsi.len(), 10);
    assert!(rsi[..5].iter().all(Option::is_none));
    assert_eq!(model.overlays.bollinger.as_ref().map(|b| b.sma.len()), Some(10));

    // without volume a bad VWAP column is simply omitted
    raw.volume.clear();
    let model = build_render_model(&raw, &view, &PrepConfig::default()).unwrap();
    assert!(model.overlays.vwap.is_none());
    assert!(model.series.volume.is_none());
}

#[test]
fn misaligned_price_column_is_rejected() {
    let mut raw = minute_payload(5);
    raw.close.pop();
    let view = ViewConfig::new("spy", Period::OneDay, Interval::minutes(1));
    let err = build_render_model(&raw, &view, &PrepConfig::default()).unwrap_err();
    assert!(
        matches!(err, PrepError::LengthMismatch { field: "close", expected: 5, found: 4 }),
        "{err}"
    );
}

#[test]
fn empty_payload_builds_empty_model() {
    let view = ViewConfig::new("spy", Period::OneMonth, Interval::minutes(30));
    let model = build_render_model(&RawSeries::default(), &view, &PrepConfig::default()).unwrap();
    assert!(model.axis.is_empty());
    assert!(model.gaps.is_empty() && model.anomalies.is_empty());
    assert!(model.summary.is_none());
}

struct CountingFetcher {
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
    fail: bool,
}

impl CountingFetcher {
    fn ready() -> Self {
        Self { calls: AtomicUsize::new(0), gate: None, fail: false }
    }
}

impl SeriesFetcher for CountingFetcher {
    fn fetch(&self, key: &CacheKey) -> BoxFuture<'static, Result<RawSeries, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.clone();
        let outcome = if self.fail {
            Err(FetchError::new(&key.symbol, "timeout"))
        } else {
            Ok(minute_payload(30))
        };
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            outcome
        }
        .boxed()
    }
}

#[tokio::test]
async fn repeated_requests_hit_the_cache_and_refresh_refetches() {
    let fetcher = Arc::new(CountingFetcher::ready());
    let preparer = Preparer::new(fetcher.clone(), PrepConfig::default());
    let view = ViewConfig::new("spy", Period::OneDay, Interval::minutes(1));

    assert!(preparer.request(&view).await.ready().is_some());
    assert!(preparer.request(&view).await.ready().is_some());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    assert!(preparer.refresh(&view).await.ready().is_some());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn completed_requests_leave_no_tracked_views() {
    let preparer = Preparer::new(Arc::new(CountingFetcher::ready()), PrepConfig::default());
    for symbol in ["spy", "qqq", "dia", "iwm"] {
        let view = ViewConfig::new(symbol, Period::OneDay, Interval::minutes(1));
        assert!(preparer.request(&view).await.ready().is_some());
    }
    assert_eq!(preparer.tracker().tracked_views(), 0);
}

#[tokio::test]
async fn fetch_failure_is_unavailable() {
    let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0), gate: None, fail: true });
    let preparer = Preparer::new(fetcher, PrepConfig::default());
    let view = ViewConfig::new("spy", Period::OneDay, Interval::minutes(1));
    match preparer.request(&view).await {
        PrepOutcome::Unavailable(PrepError::Fetch(err)) => assert_eq!(err.reason, "timeout"),
        other => panic!("expected unavailable, got {other:?}"),
    }
    assert!(preparer.cache().is_empty());
}

#[tokio::test]
async fn older_request_is_superseded() {
    let gate = Arc::new(Notify::new());
    let fetcher = Arc::new(CountingFetcher {
        calls: AtomicUsize::new(0),
        gate: Some(Arc::clone(&gate)),
        fail: false,
    });
    let preparer = Preparer::new(fetcher.clone(), PrepConfig::default());
    let view = ViewConfig::new("spy", Period::OneDay, Interval::minutes(1));
    let other_tz = view.clone().with_timezone(DisplayTimezone::Fixed(9 * 3600));

    let (first, second, other, ()) = futures::join!(
        preparer.request(&view),
        preparer.request(&view),
        preparer.request(&other_tz),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    assert!(matches!(first, PrepOutcome::Superseded));
    assert!(second.ready().is_some());
    // a different display timezone is a different view
    assert!(other.ready().is_some());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(preparer.tracker().tracked_views(), 0);
}
