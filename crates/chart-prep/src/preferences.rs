// File: crates/chart-prep/src/preferences.rs
// Summary: Saved display settings and the persistence/session collaborator seams.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::indicators::IndicatorKind;
use crate::timezone::DisplayTimezone;
use crate::types::{Interval, Period};
use crate::view::ViewConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPreferences {
    pub period: Period,
    pub interval: Interval,
    pub timezone: DisplayTimezone,
    pub indicators: Vec<IndicatorKind>,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            period: Period::OneMonth,
            interval: Interval::minutes(30),
            timezone: DisplayTimezone::Utc,
            indicators: vec![IndicatorKind::Bollinger, IndicatorKind::Vwap],
        }
    }
}

impl DisplayPreferences {
    pub fn view_for(&self, symbol: &str) -> ViewConfig {
        ViewConfig::new(symbol, self.period, self.interval)
            .with_timezone(self.timezone)
            .with_indicators(&self.indicators)
    }
}

/// Where preferences live (browser storage, server profile, ...).
pub trait PreferenceStore {
    fn load(&self) -> Result<Option<DisplayPreferences>>;
    fn save(&self, prefs: &DisplayPreferences) -> Result<()>;
}

/// Gates writes to the server-synced store.
pub trait SessionGate {
    fn is_authenticated(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    LocalOnly,
    Synced,
}

/// Always save locally; also write `remote` when the session is authenticated.
pub fn persist_preferences(
    prefs: &DisplayPreferences,
    local: &dyn PreferenceStore,
    remote: &dyn PreferenceStore,
    session: &dyn SessionGate,
) -> Result<SyncOutcome> {
    local.save(prefs)?;
    if !session.is_authenticated() {
        return Ok(SyncOutcome::LocalOnly);
    }
    remote.save(prefs)?;
    Ok(SyncOutcome::Synced)
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    slot: Mutex<Option<DisplayPreferences>>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Option<DisplayPreferences>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, prefs: &DisplayPreferences) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(prefs.clone());
        Ok(())
    }
}
