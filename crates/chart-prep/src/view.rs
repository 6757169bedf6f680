// File: crates/chart-prep/src/view.rs
// Summary: View configuration and per-view request generations ("last request wins").

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;
use crate::indicators::IndicatorKind;
use crate::timezone::DisplayTimezone;
use crate::types::{Interval, Period};

/// What the caller wants to see for one symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub symbol: String,
    pub period: Period,
    pub interval: Interval,
    #[serde(default)]
    pub timezone: DisplayTimezone,
    #[serde(default)]
    pub indicators: Vec<IndicatorKind>,
}

impl ViewConfig {
    pub fn new(symbol: impl Into<String>, period: Period, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            period,
            interval,
            timezone: DisplayTimezone::Utc,
            indicators: Vec::new(),
        }
    }

    pub fn with_timezone(mut self, timezone: DisplayTimezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_indicators(mut self, indicators: &[IndicatorKind]) -> Self {
        self.indicators = indicators.to_vec();
        self
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.symbol, self.period, self.interval)
    }

    pub fn view_key(&self) -> ViewKey {
        ViewKey { cache: self.cache_key(), timezone: self.timezone }
    }
}

/// Identity of a logical view: requests sharing it supersede one another.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub cache: CacheKey,
    pub timezone: DisplayTimezone,
}

/// Generation token handed out when a request starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub view: ViewKey,
    pub generation: u64,
}

/// Tracks the newest generation issued per view.
#[derive(Debug, Default)]
pub struct RequestTracker {
    counter: AtomicU64,
    latest: Mutex<HashMap<ViewKey, u64>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new, monotonically increasing generation for `view`.
    pub fn begin(&self, view: ViewKey) -> Ticket {
        let generation = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(view.clone(), generation);
        Ticket { view, generation }
    }

    /// False once a newer request for the same view has begun.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ticket.view)
            .is_some_and(|&g| g == ticket.generation)
    }

    /// Forget `ticket`'s view if it is still the newest request for it.
    /// A superseded ticket leaves the newer entry in place.
    pub fn finish(&self, ticket: &Ticket) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.get(&ticket.view) == Some(&ticket.generation) {
            latest.remove(&ticket.view);
        }
    }

    /// Views with a request still in flight.
    pub fn tracked_views(&self) -> usize {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
