// File: crates/chart-prep/src/anomaly.rs
// Summary: Aligns externally supplied anomaly events onto the built axis.

use serde::Serialize;

use crate::axis::{AxisMode, AxisModel};
use crate::timezone::parse_epoch_millis;

/// Anomaly flagged upstream, normalized to a UTC epoch-ms instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AnomalyEvent {
    pub timestamp: i64,
    pub value: Option<f64>,
}

impl AnomalyEvent {
    /// `None` when the timestamp cannot be parsed; only this event is lost.
    pub fn parse(timestamp: &str, value: Option<f64>) -> Option<Self> {
        parse_epoch_millis(timestamp).map(|timestamp| Self { timestamp, value })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MappedAnomaly {
    pub index: usize,
    pub position: f64,
    pub value: Option<f64>,
    /// Distance between the event and the sample it landed on.
    pub offset_ms: i64,
}

/// Place each event on the axis.
/// Literal axes accept only exact timestamp matches. Ordinal axes snap to the
/// nearest sample if it lies within `tolerance_ms` (inclusive). Unmatched events
/// are dropped; several events may land on one index. A missing event value
/// falls back to `closes` at the matched index.
pub fn map_anomalies(
    axis: &AxisModel,
    closes: &[Option<f64>],
    events: &[AnomalyEvent],
    tolerance_ms: i64,
) -> Vec<MappedAnomaly> {
    let ts = &axis.timestamps;
    let mut out = Vec::new();
    for event in events {
        let hit = match axis.mode {
            AxisMode::Literal => ts.binary_search(&event.timestamp).ok().map(|i| (i, 0)),
            AxisMode::Ordinal => nearest(ts, event.timestamp).filter(|&(_, d)| d <= tolerance_ms),
        };
        match hit {
            Some((index, offset_ms)) => out.push(MappedAnomaly {
                index,
                position: axis.position(index),
                value: event.value.or_else(|| closes.get(index).copied().flatten()),
                offset_ms,
            }),
            None => log::debug!("anomaly at {} has no admissible sample; dropped", event.timestamp),
        }
    }
    out
}

/// Index of the sample closest to `target` and its absolute distance.
/// Ties go to the earlier sample.
fn nearest(ts: &[i64], target: i64) -> Option<(usize, i64)> {
    let right = ts.partition_point(|&t| t < target);
    let candidates = [right.checked_sub(1), (right < ts.len()).then_some(right)];
    candidates
        .into_iter()
        .flatten()
        .map(|i| (i, (ts[i] - target).abs()))
        .min_by_key(|&(_, d)| d)
}
