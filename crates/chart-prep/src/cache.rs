// File: crates/chart-prep/src/cache.rs
// Summary: TTL-keyed store of fetched payloads with single-flight fetching per key.
// Notes:
// - Entries are replaced wholesale (`Arc<CacheEntry>` swap under the lock); readers
//   never observe a partially written entry.
// - At most one fetch per key is in flight; later callers await the same shared future.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::series::RawSeries;
use crate::types::{Interval, Period, TtlClass};

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }
    pub fn set(&self, at: DateTime<Utc>) {
        *lock(&self.now) = at;
    }
    pub fn advance(&self, by: TimeDelta) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Upper-cased ticker.
    pub symbol: String,
    pub period: Period,
    pub interval: Interval,
}

impl CacheKey {
    pub fn new(symbol: &str, period: Period, interval: Interval) -> Self {
        Self { symbol: symbol.trim().to_ascii_uppercase(), period, interval }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chart::{}::{}::{}", self.symbol, self.period, self.interval)
    }
}

/// Entry lifetime per period class, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    pub short_secs: i64,
    pub medium_secs: i64,
    pub long_secs: i64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self { short_secs: 5 * 60, medium_secs: 60 * 60, long_secs: 24 * 60 * 60 }
    }
}

impl TtlPolicy {
    pub fn ttl(&self, period: Period) -> TimeDelta {
        let secs = match period.ttl_class() {
            TtlClass::Short => self.short_secs,
            TtlClass::Medium => self.medium_secs,
            TtlClass::Long => self.long_secs,
        };
        TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: Arc<RawSeries>,
    pub fetched_at: DateTime<Utc>,
}

/// Fetch collaborator: network/storage access behind a cache miss.
pub trait SeriesFetcher: Send + Sync {
    fn fetch(&self, key: &CacheKey) -> BoxFuture<'static, Result<RawSeries, FetchError>>;
}

type InFlight = Shared<BoxFuture<'static, Result<Arc<RawSeries>, FetchError>>>;

pub struct TimeSeriesCache {
    entries: Arc<Mutex<HashMap<CacheKey, Arc<CacheEntry>>>>,
    inflight: Arc<Mutex<HashMap<CacheKey, InFlight>>>,
    clock: Arc<dyn Clock>,
    policy: TtlPolicy,
}

impl TimeSeriesCache {
    pub fn new(policy: TtlPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Payload if present and `now - fetched_at < ttl(period)`; an expired entry is evicted.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<RawSeries>> {
        let now = self.clock.now();
        let ttl = self.policy.ttl(key.period);
        let mut entries = lock(&self.entries);
        let fresh = entries.get(key).map(|e| (now - e.fetched_at < ttl, Arc::clone(&e.payload)));
        match fresh {
            Some((true, payload)) => Some(payload),
            Some((false, _)) => {
                entries.remove(key);
                log::debug!("evicted expired entry {key}");
                None
            }
            None => None,
        }
    }

    /// Store `payload` stamped with the current time, replacing any prior entry.
    pub fn put(&self, key: CacheKey, payload: RawSeries) -> Arc<CacheEntry> {
        store(&self.entries, key, Arc::new(payload), self.clock.now())
    }

    /// Force the next `get` for `key` to miss. Returns whether an entry was removed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        lock(&self.entries).remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a fetch for `key` is currently outstanding.
    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        lock(&self.inflight).contains_key(key)
    }

    /// Cached payload, or the outcome of the single in-flight fetch for `key`.
    /// A miss always fetches; an expired entry is never returned as a fallback.
    pub async fn get_or_fetch(
        &self,
        key: &CacheKey,
        fetcher: &dyn SeriesFetcher,
    ) -> Result<Arc<RawSeries>, FetchError> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let pending = {
            let mut inflight = lock(&self.inflight);
            match inflight.get(key) {
                Some(pending) => {
                    log::debug!("joining in-flight fetch for {key}");
                    pending.clone()
                }
                None => {
                    log::info!("cache miss for {key}; fetching");
                    let pending = self.start_fetch(key.clone(), fetcher.fetch(key));
                    inflight.insert(key.clone(), pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn start_fetch(
        &self,
        key: CacheKey,
        request: BoxFuture<'static, Result<RawSeries, FetchError>>,
    ) -> InFlight {
        let entries = Arc::clone(&self.entries);
        let inflight = Arc::clone(&self.inflight);
        let clock = Arc::clone(&self.clock);
        async move {
            let outcome = request.await.map(Arc::new);
            match &outcome {
                Ok(payload) => {
                    store(&entries, key.clone(), Arc::clone(payload), clock.now());
                }
                Err(err) => log::warn!("fetch for {key} failed: {err}"),
            }
            lock(&inflight).remove(&key);
            outcome
        }
        .boxed()
        .shared()
    }
}

fn store(
    entries: &Mutex<HashMap<CacheKey, Arc<CacheEntry>>>,
    key: CacheKey,
    payload: Arc<RawSeries>,
    fetched_at: DateTime<Utc>,
) -> Arc<CacheEntry> {
    let entry = Arc::new(CacheEntry { key: key.clone(), payload, fetched_at });
    lock(entries).insert(key, Arc::clone(&entry));
    entry
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
