// File: crates/chart-prep/src/config.rs
// Summary: Tunables for the preparation pipeline; every field has a default.

use serde::{Deserialize, Serialize};

use crate::cache::TtlPolicy;
use crate::error::{PrepError, Result};
use crate::gaps::GapPolicy;
use crate::indicators::IndicatorParams;
use crate::types::HOUR_MS;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Aimed-for number of axis ticks; the forced last tick may add one more.
    pub target_ticks: usize,
    /// Max distance, in milliseconds, an anomaly may snap on an ordinal axis.
    pub anomaly_tolerance_ms: i64,
    pub gap: GapPolicy,
    pub indicators: IndicatorParams,
    pub ttl: TtlPolicy,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            target_ticks: 7,
            anomaly_tolerance_ms: 24 * HOUR_MS,
            gap: GapPolicy::default(),
            indicators: IndicatorParams::default(),
            ttl: TtlPolicy::default(),
        }
    }
}

impl PrepConfig {
    /// Parse a (possibly partial) JSON document; missing keys keep defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: PrepConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PrepError::InvalidConfig(msg.to_string()));
        if self.target_ticks == 0 {
            return invalid("target_ticks must be at least 1");
        }
        if self.anomaly_tolerance_ms < 0 {
            return invalid("anomaly_tolerance_ms must not be negative");
        }
        if !(self.gap.multiplier > 0.0) || self.gap.floor_ms < 0 {
            return invalid("gap policy needs a positive multiplier and a non-negative floor");
        }
        let p = &self.indicators;
        let windows = [p.bollinger_window, p.macd_fast, p.macd_slow, p.macd_signal, p.rsi_period];
        if windows.contains(&0) {
            return invalid("indicator windows must be at least 1");
        }
        if !(p.bollinger_k >= 0.0) {
            return invalid("bollinger_k must be a non-negative number");
        }
        if self.ttl.short_secs < 0 || self.ttl.medium_secs < 0 || self.ttl.long_secs < 0 {
            return invalid("ttl durations must not be negative");
        }
        Ok(())
    }
}
