// File: crates/chart-prep/tests/cache.rs
// Purpose: TTL expiry at the boundary, invalidation and single-flight fetching.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chart_prep::{
    CacheKey, Clock, FetchError, Interval, ManualClock, Period, RawSeries, SeriesFetcher,
    TimeSeriesCache, TtlPolicy,
};
use chrono::{TimeDelta, TimeZone, Utc};
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;

fn payload(tag: &str) -> RawSeries {
    RawSeries {
        dates: vec!["2024-03-01T14:30:00Z".into()],
        close: vec![Some(1.0)],
        ticker: Some(tag.into()),
        ..RawSeries::default()
    }
}

fn key(period: Period) -> CacheKey {
    CacheKey::new("aapl", period, Interval::minutes(30))
}

fn cache_at_t0() -> (TimeSeriesCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()));
    (TimeSeriesCache::with_clock(TtlPolicy::default(), clock.clone()), clock)
}

/// Replays scripted outcomes and counts calls.
struct ScriptedFetcher {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<RawSeries, FetchError>>>,
}

impl ScriptedFetcher {
    fn new(script: Vec<Result<RawSeries, FetchError>>) -> Self {
        Self { calls: AtomicUsize::new(0), script: Mutex::new(script.into()) }
    }
}

impl SeriesFetcher for ScriptedFetcher {
    fn fetch(&self, key: &CacheKey) -> BoxFuture<'static, Result<RawSeries, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::new(&key.symbol, "script exhausted")));
        futures::future::ready(next).boxed()
    }
}

/// Holds every fetch until the gate is opened.
struct GatedFetcher {
    calls: AtomicUsize,
    gate: Arc<Notify>,
}

impl SeriesFetcher for GatedFetcher {
    fn fetch(&self, _key: &CacheKey) -> BoxFuture<'static, Result<RawSeries, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = Arc::clone(&self.gate);
        async move {
            gate.notified().await;
            Ok(payload("gated"))
        }
        .boxed()
    }
}

#[test]
fn key_format_and_symbol_case() {
    let k = key(Period::OneMonth);
    assert_eq!(k.to_string(), "chart::AAPL::1mo::30m");
    assert_eq!(k, CacheKey::new(" AAPL ", Period::OneMonth, Interval::minutes(30)));
}

#[test]
fn ttl_classes() {
    let p = TtlPolicy::default();
    assert_eq!(p.ttl(Period::OneDay), TimeDelta::minutes(5));
    assert_eq!(p.ttl(Period::FiveDays), TimeDelta::hours(1));
    assert_eq!(p.ttl(Period::OneMonth), TimeDelta::hours(1));
    assert_eq!(p.ttl(Period::OneYear), TimeDelta::hours(24));
    assert_eq!(p.ttl(Period::Max), TimeDelta::hours(24));
}

#[test]
fn entry_expires_at_ttl_boundary() {
    let (cache, clock) = cache_at_t0();
    let t0 = clock.now();
    let k = key(Period::OneDay);
    cache.put(k.clone(), payload("a"));

    clock.set(t0 + TimeDelta::minutes(5) - TimeDelta::milliseconds(1));
    assert!(cache.get(&k).is_some(), "one ms before expiry is a hit");

    clock.set(t0 + TimeDelta::minutes(5));
    assert!(cache.get(&k).is_none(), "age equal to ttl is a miss");
    assert!(cache.is_empty(), "expired entry is evicted");

    cache.put(k.clone(), payload("b"));
    clock.advance(TimeDelta::minutes(5) + TimeDelta::milliseconds(1));
    assert!(cache.get(&k).is_none());
}

#[test]
fn put_replaces_and_invalidate_forces_miss() {
    let (cache, _clock) = cache_at_t0();
    let k = key(Period::OneMonth);
    cache.put(k.clone(), payload("a"));
    cache.put(k.clone(), payload("b"));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&k).unwrap().ticker.as_deref(), Some("b"));

    assert!(cache.invalidate(&k));
    assert!(!cache.invalidate(&k));
    assert!(cache.get(&k).is_none());
}

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    let (cache, _clock) = cache_at_t0();
    let gate = Arc::new(Notify::new());
    let fetcher = GatedFetcher { calls: AtomicUsize::new(0), gate: Arc::clone(&gate) };
    let k = key(Period::OneMonth);

    let (a, b, ()) = futures::join!(
        cache.get_or_fetch(&k, &fetcher),
        cache.get_or_fetch(&k, &fetcher),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 1);
    assert!(!cache.is_fetching(&k));

    // served from cache now
    let c = cache.get_or_fetch(&k, &fetcher).await.unwrap();
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let (cache, _clock) = cache_at_t0();
    let fetcher =
        ScriptedFetcher::new(vec![Err(FetchError::new("AAPL", "upstream 503")), Ok(payload("ok"))]);
    let k = key(Period::FiveDays);

    let err = cache.get_or_fetch(&k, &fetcher).await.unwrap_err();
    assert_eq!(err.reason, "upstream 503");
    assert!(cache.is_empty());
    assert!(!cache.is_fetching(&k));

    let ok = cache.get_or_fetch(&k, &fetcher).await.unwrap();
    assert_eq!(ok.ticker.as_deref(), Some("ok"));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_entry_is_refetched_not_served() {
    let (cache, clock) = cache_at_t0();
    let fetcher = ScriptedFetcher::new(vec![Ok(payload("fresh"))]);
    let k = key(Period::OneYear);
    cache.put(k.clone(), payload("stale"));
    clock.advance(TimeDelta::hours(25));

    let got = cache.get_or_fetch(&k, &fetcher).await.unwrap();
    assert_eq!(got.ticker.as_deref(), Some("fresh"));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}
