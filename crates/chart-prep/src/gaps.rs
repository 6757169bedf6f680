// File: crates/chart-prep/src/gaps.rs
// Summary: Abnormal time-gap detection emitting dashed connector overlays.

use serde::{Deserialize, Serialize};

use crate::axis::AxisModel;
use crate::types::MINUTE_MS;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapPolicy {
    /// Multiple of the expected delta beyond which a pair is a gap.
    pub multiplier: f64,
    /// Absolute lower bound on the threshold, in milliseconds.
    pub floor_ms: i64,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self { multiplier: 3.0, floor_ms: 30 * MINUTE_MS }
    }
}

impl GapPolicy {
    /// `max(multiplier * expected, floor)`.
    pub fn threshold_ms(&self, expected_ms: i64) -> f64 {
        (self.multiplier * expected_ms as f64).max(self.floor_ms as f64)
    }
}

/// Rendering hint: the collaborator must draw this non-solid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStyle {
    Dashed,
}

/// Straight connector bridging one detected gap, in final axis coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GapConnector {
    pub from_index: usize,
    pub to_index: usize,
    pub from_position: f64,
    pub to_position: f64,
    pub from_value: Option<f64>,
    pub to_value: Option<f64>,
    pub gap_ms: i64,
    pub style: ConnectorStyle,
}

/// Flag consecutive samples whose real delta exceeds the policy threshold for
/// `nominal_interval_ms`. `values` supplies the connector endpoints (usually closes).
pub fn detect_gaps(
    axis: &AxisModel,
    values: &[Option<f64>],
    nominal_interval_ms: i64,
    policy: &GapPolicy,
) -> Vec<GapConnector> {
    let threshold = policy.threshold_ms(nominal_interval_ms);
    let value = |i: usize| values.get(i).copied().flatten();
    axis.timestamps
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let gap_ms = pair[1] - pair[0];
            ((gap_ms as f64) > threshold).then(|| GapConnector {
                from_index: i,
                to_index: i + 1,
                from_position: axis.position(i),
                to_position: axis.position(i + 1),
                from_value: value(i),
                to_value: value(i + 1),
                gap_ms,
                style: ConnectorStyle::Dashed,
            })
        })
        .collect()
}
