// File: crates/chart-prep/src/axis.rs
// Summary: Display axis model (literal time vs ordinal index) with localized tick and hover labels.

use serde::Serialize;

use crate::grid::tick_indices;
use crate::timezone::DisplayTimezone;
use crate::types::{LabelGranularity, Period};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisMode {
    /// X is elapsed time; gaps keep their real width.
    Literal,
    /// X is the sample index; non-trading gaps collapse to zero width.
    Ordinal,
}

impl AxisMode {
    pub fn for_period(period: Period) -> Self {
        if period.is_single_day() { AxisMode::Literal } else { AxisMode::Ordinal }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AxisModel {
    pub mode: AxisMode,
    /// Chronological sample timestamps (epoch ms); literal positions.
    pub timestamps: Vec<i64>,
    /// Strictly increasing; always includes 0 and `len - 1` when non-empty.
    pub tick_indices: Vec<usize>,
    pub tick_labels: Vec<String>,
    /// One label per sample at full granularity.
    pub hover_labels: Vec<String>,
}

impl AxisModel {
    pub fn build(
        timestamps: &[i64],
        period: Period,
        timezone: DisplayTimezone,
        target_ticks: usize,
    ) -> Self {
        let mode = AxisMode::for_period(period);
        Self::build_with(timestamps, mode, period.label_granularity(), timezone, target_ticks)
    }

    pub fn build_with(
        timestamps: &[i64],
        mode: AxisMode,
        granularity: LabelGranularity,
        timezone: DisplayTimezone,
        target_ticks: usize,
    ) -> Self {
        let ticks = tick_indices(timestamps.len(), target_ticks);
        let tick_labels = ticks
            .iter()
            .map(|&i| timezone.format_label(timestamps[i], granularity).unwrap_or_default())
            .collect();
        let hover_labels = timestamps
            .iter()
            .map(|&ts| timezone.format_hover(ts).unwrap_or_default())
            .collect();
        Self {
            mode,
            timestamps: timestamps.to_vec(),
            tick_indices: ticks,
            tick_labels,
            hover_labels,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Axis position of sample `index`: its timestamp on a literal axis,
    /// its index on an ordinal one.
    #[inline]
    pub fn position(&self, index: usize) -> f64 {
        match self.mode {
            AxisMode::Literal => self.timestamps[index] as f64,
            AxisMode::Ordinal => index as f64,
        }
    }

    pub fn positions(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.position(i)).collect()
    }
}
