// File: crates/chart-prep/src/pipeline.rs
// Summary: Assembles a RenderModel from a payload and drives cache → fetch → prepare per request.

use std::sync::Arc;

use serde::Serialize;

use crate::anomaly::{map_anomalies, MappedAnomaly};
use crate::axis::AxisModel;
use crate::cache::{SeriesFetcher, TimeSeriesCache};
use crate::config::PrepConfig;
use crate::error::{PrepError, Result};
use crate::gaps::{detect_gaps, GapConnector};
use crate::indicators::{fill_indicators, Overlays};
use crate::resample::{needs_resample, resample};
use crate::series::{PriceChange, RawSeries, Series};
use crate::types::Interval;
use crate::view::{RequestTracker, ViewConfig};

/// OHLCV columns aligned index-for-index with the axis.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SeriesArrays {
    pub open: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub close: Vec<Option<f64>>,
    pub volume: Option<Vec<Option<f64>>>,
}

/// Everything the rendering collaborator needs for one view.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderModel {
    pub symbol: String,
    /// Width of one sample after any resampling.
    pub interval: Interval,
    pub resampled: bool,
    pub axis: AxisModel,
    pub series: SeriesArrays,
    pub overlays: Overlays,
    pub gaps: Vec<GapConnector>,
    pub anomalies: Vec<MappedAnomaly>,
    pub summary: Option<PriceChange>,
}

/// Run the synchronous part of the pipeline on one payload:
/// resample (if coarser) → indicators → axis → gaps → anomalies.
pub fn build_render_model(
    raw: &RawSeries,
    view: &ViewConfig,
    config: &PrepConfig,
) -> Result<RenderModel> {
    let source = Series::from_raw(raw)?;
    let native_ms = source.nominal_interval_ms();
    let resampled = needs_resample(&source, view.interval);
    let series = if resampled {
        resample(&source, view.interval, &config.indicators)
    } else {
        source
    };

    let view_ms = view.interval.as_millis();
    let nominal_ms = native_ms.map_or(view_ms, |n| n.max(view_ms));
    let interval = Interval::from_millis(nominal_ms).unwrap_or(view.interval);

    let overlays = fill_indicators(&series, &view.indicators, &config.indicators);
    let axis =
        AxisModel::build(&series.timestamps, view.period, view.timezone, config.target_ticks);
    let gaps = detect_gaps(&axis, &series.close, nominal_ms, &config.gap);
    let anomalies =
        map_anomalies(&axis, &series.close, &series.anomalies, config.anomaly_tolerance_ms);
    let summary = series.price_change();

    log::debug!(
        "{}: {} samples at {} ({:?} axis), {} gaps, {} of {} anomalies placed",
        view.symbol,
        series.len(),
        interval,
        axis.mode,
        gaps.len(),
        anomalies.len(),
        series.anomalies.len()
    );

    Ok(RenderModel {
        symbol: view.symbol.trim().to_ascii_uppercase(),
        interval,
        resampled,
        axis,
        series: SeriesArrays {
            open: series.open,
            high: series.high,
            low: series.low,
            close: series.close,
            volume: series.volume,
        },
        overlays,
        gaps,
        anomalies,
        summary,
    })
}

/// Result state of one request.
#[derive(Debug)]
pub enum PrepOutcome {
    Ready(Box<RenderModel>),
    /// A newer request for the same view began before this one finished.
    Superseded,
    /// The fetch failed or the payload could not be used.
    Unavailable(PrepError),
}

impl PrepOutcome {
    pub fn ready(self) -> Option<RenderModel> {
        match self {
            PrepOutcome::Ready(model) => Some(*model),
            _ => None,
        }
    }
}

/// Per-request driver: cache lookup, single-flight fetch, staleness check, build.
pub struct Preparer {
    cache: TimeSeriesCache,
    fetcher: Arc<dyn SeriesFetcher>,
    tracker: RequestTracker,
    config: PrepConfig,
}

impl Preparer {
    pub fn new(fetcher: Arc<dyn SeriesFetcher>, config: PrepConfig) -> Self {
        let cache = TimeSeriesCache::new(config.ttl);
        Self::with_cache(fetcher, cache, config)
    }

    pub fn with_cache(
        fetcher: Arc<dyn SeriesFetcher>,
        cache: TimeSeriesCache,
        config: PrepConfig,
    ) -> Self {
        Self { cache, fetcher, tracker: RequestTracker::new(), config }
    }

    pub fn cache(&self) -> &TimeSeriesCache {
        &self.cache
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    pub async fn request(&self, view: &ViewConfig) -> PrepOutcome {
        let ticket = self.tracker.begin(view.view_key());
        let payload = self.cache.get_or_fetch(&view.cache_key(), self.fetcher.as_ref()).await;
        if !self.tracker.is_current(&ticket) {
            log::debug!(
                "discarding superseded generation {} for {}",
                ticket.generation,
                view.symbol
            );
            return PrepOutcome::Superseded;
        }
        self.tracker.finish(&ticket);
        let prepared = payload
            .map_err(PrepError::from)
            .and_then(|raw| build_render_model(&raw, view, &self.config));
        match prepared {
            Ok(model) => PrepOutcome::Ready(Box::new(model)),
            Err(err) => {
                log::warn!("{} unavailable: {err}", view.symbol);
                PrepOutcome::Unavailable(err)
            }
        }
    }

    /// Manual refresh: drop the cached entry, then request again.
    pub async fn refresh(&self, view: &ViewConfig) -> PrepOutcome {
        self.cache.invalidate(&view.cache_key());
        self.request(view).await
    }
}
