// File: crates/chart-prep/src/lib.rs
// Summary: Core library entry point; exports the time-series preparation API for chart views.

pub mod anomaly;
pub mod axis;
pub mod cache;
pub mod config;
pub mod error;
pub mod gaps;
pub mod grid;
pub mod indicators;
pub mod pipeline;
pub mod preferences;
pub mod resample;
pub mod series;
pub mod timezone;
pub mod types;
pub mod view;

pub use anomaly::{map_anomalies, AnomalyEvent, MappedAnomaly};
pub use axis::{AxisMode, AxisModel};
pub use cache::{
    CacheEntry, CacheKey, Clock, ManualClock, SeriesFetcher, SystemClock, TimeSeriesCache,
    TtlPolicy,
};
pub use config::PrepConfig;
pub use error::{FetchError, PrepError};
pub use gaps::{detect_gaps, ConnectorStyle, GapConnector, GapPolicy};
pub use indicators::{Bands, IndicatorKind, IndicatorParams, Macd, Overlays};
pub use pipeline::{build_render_model, PrepOutcome, Preparer, RenderModel, SeriesArrays};
pub use preferences::{
    persist_preferences, DisplayPreferences, PreferenceStore, SessionGate, SyncOutcome,
};
pub use resample::resample;
pub use series::{PriceChange, RawSeries, Series};
pub use timezone::DisplayTimezone;
pub use types::{Interval, LabelGranularity, Period};
pub use view::{RequestTracker, Ticket, ViewConfig, ViewKey};
