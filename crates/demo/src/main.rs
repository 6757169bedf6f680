// File: crates/demo/src/main.rs
// Summary: Demo loads an OHLCV CSV or JSON chart payload, runs one view request through the
//          preparation pipeline and writes the resulting render model as JSON.

use anyhow::{Context, Result};
use chart_prep::preferences::MemoryPreferenceStore;
use chart_prep::timezone::canonical_utc;
use chart_prep::{
    persist_preferences, CacheKey, DisplayPreferences, FetchError, IndicatorKind, PrepConfig,
    PrepError, PrepOutcome, PreferenceStore, Preparer, RawSeries, SeriesFetcher, SessionGate,
};
use futures::future::{self, BoxFuture};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_INPUT: &str = "binanceus_CRVUSDT_6h_2023-09-13_to_2025-01-21.csv";

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse(std::env::args().skip(1))?;
    let (path, used_alt) = resolve_path(&args.input)?;
    log::info!("Using input file: {}", path.display());
    if used_alt {
        log::info!("  (extension swapped between .csv/.cvs)");
    }

    let raw = load_payload(&path).with_context(|| format!("failed to load '{}'", path.display()))?;
    log::info!("Loaded {} samples", raw.len());
    if raw.is_empty() {
        anyhow::bail!("no samples loaded, check headers/delimiter.");
    }

    let config = match &args.config {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("reading config {}", p.display()))?;
            PrepConfig::from_json_str(&text)
                .with_context(|| format!("parsing config {}", p.display()))?
        }
        None => PrepConfig::default(),
    };

    let prefs = DisplayPreferences {
        period: args.period.parse()?,
        interval: args.interval.parse()?,
        timezone: args.timezone.parse()?,
        indicators: IndicatorKind::ALL.to_vec(),
    };
    let symbol = raw.ticker.clone().unwrap_or_else(|| symbol_from_path(&path));
    let view = prefs.view_for(&symbol);

    let preparer = Preparer::new(Arc::new(FileFetcher { payload: raw }), config);
    let outcome = futures::executor::block_on(preparer.request(&view));
    let model = match outcome {
        PrepOutcome::Ready(model) => model,
        PrepOutcome::Superseded => anyhow::bail!("request superseded"),
        PrepOutcome::Unavailable(err) => return Err(err).context("data unavailable"),
    };

    log::info!(
        "{} {} @ {}: {} points ({:?} axis{}), {} ticks, {} gaps, {} anomalies",
        model.symbol,
        view.period,
        model.interval,
        model.axis.len(),
        model.axis.mode,
        if model.resampled { ", resampled" } else { "" },
        model.axis.tick_indices.len(),
        model.gaps.len(),
        model.anomalies.len()
    );
    if let Some(change) = &model.summary {
        let pct = change.pct_change.map_or("n/a".into(), |p| format!("{p:+.2}%"));
        log::info!("Last change: {:+.4} ({})", change.change, pct);
    }

    let out = out_name_with(&path, "prepared");
    let json = serde_json::to_string_pretty(&*model).context("serializing render model")?;
    std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
    println!("Wrote {}", out.display());

    let local = JsonFileStore { path: out.with_file_name("preferences.json") };
    let remote = MemoryPreferenceStore::default();
    let synced = persist_preferences(&prefs, &local, &remote, &EnvSession)?;
    log::info!("Preferences saved ({synced:?})");
    Ok(())
}

struct Args {
    input: String,
    period: String,
    interval: String,
    timezone: String,
    config: Option<PathBuf>,
}

impl Args {
    /// `<input> [period] [interval] [timezone] [--config path.json]`
    fn parse(mut it: impl Iterator<Item = String>) -> Result<Self> {
        let mut positional = Vec::new();
        let mut config = None;
        while let Some(arg) = it.next() {
            if arg == "--config" {
                config = Some(PathBuf::from(it.next().context("--config needs a path")?));
            } else {
                positional.push(arg);
            }
        }
        let mut positional = positional.into_iter();
        Ok(Self {
            input: positional.next().unwrap_or_else(|| DEFAULT_INPUT.to_string()),
            period: positional.next().unwrap_or_else(|| "1mo".to_string()),
            interval: positional.next().unwrap_or_else(|| "30m".to_string()),
            timezone: positional.next().unwrap_or_else(|| "UTC".to_string()),
            config,
        })
    }
}

/// Fetch collaborator backed by an already-loaded payload.
struct FileFetcher {
    payload: RawSeries,
}

impl SeriesFetcher for FileFetcher {
    fn fetch(&self, key: &CacheKey) -> BoxFuture<'static, Result<RawSeries, FetchError>> {
        log::debug!("serving {key} from file");
        Box::pin(future::ready(Ok(self.payload.clone())))
    }
}

/// Treats a non-empty `CHART_PREP_SESSION` as an authenticated session.
struct EnvSession;

impl SessionGate for EnvSession {
    fn is_authenticated(&self) -> bool {
        std::env::var("CHART_PREP_SESSION").is_ok_and(|v| !v.trim().is_empty())
    }
}

struct JsonFileStore {
    path: PathBuf,
}

impl PreferenceStore for JsonFileStore {
    fn load(&self) -> chart_prep::error::Result<Option<DisplayPreferences>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| PrepError::Preferences(e.to_string()))?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, prefs: &DisplayPreferences) -> chart_prep::error::Result<()> {
        let json = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, json).map_err(|e| PrepError::Preferences(e.to_string()))
    }
}

/// Resolve path, trying .csv/.cvs swap if needed.
/// Returns (actual_path, used_alt)
fn resolve_path(raw: &str) -> Result<(PathBuf, bool)> {
    let p = Path::new(raw);
    if p.exists() {
        return Ok((p.to_path_buf(), false));
    }
    if let Some(alt) = swap_ext(p) {
        if alt.exists() {
            return Ok((alt, true));
        }
    }
    anyhow::bail!("file not found: {}", p.display());
}

/// Produce output file name like target/out/<stem>_<suffix>.json
fn out_name_with(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("chart");
    let short = stem.split('_').take(3).collect::<Vec<_>>().join("_");
    let mut out = PathBuf::from("target/out");
    std::fs::create_dir_all(&out).ok();
    if short.is_empty() {
        out.push(format!("chart_{}.json", suffix));
    } else {
        out.push(format!("{}_{}.json", short, suffix));
    }
    out
}

fn symbol_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split('_').nth(1).or(Some(s)))
        .unwrap_or("UNKNOWN")
        .to_ascii_uppercase()
}

fn load_payload(path: &Path) -> Result<RawSeries> {
    let is_json = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        let text = std::fs::read_to_string(path)?;
        return Ok(RawSeries::from_json(&text)?);
    }
    load_ohlc_csv(path)
}

/// Load a Binance/Yahoo-like OHLCV CSV into the chart payload shape.
fn load_ohlc_csv(path: &Path) -> Result<RawSeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers = rdr.headers()?.iter().map(|h| h.trim().to_lowercase()).collect::<Vec<_>>();
    log::debug!("Headers: {:?}", headers);

    let idx = |names: &[&str]| -> Option<usize> {
        headers.iter().position(|h| names.contains(&h.as_str()))
    };

    let i_time = idx(&["time", "timestamp", "open_time", "date", "datetime"]);
    let i_open = idx(&["open", "o"]);
    let i_high = idx(&["high", "h"]);
    let i_low = idx(&["low", "l"]);
    let i_close = idx(&["close", "c", "adj_close", "close_price"]);
    let i_volume = idx(&["volume", "vol", "v"]);

    let Some(i_time) = i_time else {
        anyhow::bail!("no time column found in {:?}", headers);
    };
    if i_close.is_none() {
        log::warn!("Could not find a close column; indicators will be empty.");
    }

    let mut out = RawSeries::default();
    for rec in rdr.records() {
        let rec = rec?;
        let parse = |i: Option<usize>| -> Option<f64> {
            i.and_then(|ix| rec.get(ix)).and_then(|s| s.trim().parse::<f64>().ok())
        };
        let Some(date) = rec.get(i_time).and_then(normalize_time_cell) else {
            continue;
        };
        out.dates.push(date);
        out.open.push(parse(i_open));
        out.high.push(parse(i_high));
        out.low.push(parse(i_low));
        out.close.push(parse(i_close));
        if i_volume.is_some() {
            out.volume.push(parse(i_volume));
        }
    }
    Ok(out)
}

/// Epoch seconds/milliseconds become canonical UTC strings; anything else passes through
/// for the core parser to accept or reject.
fn normalize_time_cell(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        let ms = if n > 10_i64.pow(12) { n } else { n * 1000 };
        return canonical_utc(ms);
    }
    Some(s.to_string())
}

fn swap_ext(p: &Path) -> Option<PathBuf> {
    let mut alt = p.to_path_buf();
    let ext = p.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "cvs" => {
            alt.set_extension("csv");
            Some(alt)
        }
        "csv" => {
            alt.set_extension("cvs");
            Some(alt)
        }
        _ => None,
    }
}
