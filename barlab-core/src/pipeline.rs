//! Pipeline orchestration: the single public entry point.
//!
//! Stages run in a fixed order, each consuming only its predecessor's
//! output:
//!
//! ResolveIdentity → Load → MergeOverlap → Adjust → BuildGrid → FillGaps
//! → [Resample] → CacheWrite → Ready
//!
//! Hard errors (configuration, schema violations) abort with context.
//! "No raw data in range" succeeds with an empty table. Cache I/O trouble
//! degrades to recompute-without-caching. There are no internal retries;
//! retry policy belongs to whatever feeds the raw partitions.

use crate::cache::{put_best_effort, CacheKey, CacheParams, CacheStore};
use crate::calendar::{build_grid, TradingCalendar};
use crate::config::{ConfigError, EngineConfig};
use crate::domain::Bar;
use crate::gapfill::fill_gaps;
use crate::identity::{merge_group_bars, resolve, InstrumentRecord, ResolvedUniverse};
use crate::load::{BarSource, LoadError};
use crate::resample::resample;
use crate::splits::{adjust, SplitEvent};
use crate::timeframe::Timeframe;
use chrono::NaiveDate;
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("empty ticker set after identity resolution and universe filters")]
    EmptyTickerSet,

    #[error("load stage failed: {0}")]
    Load(#[from] LoadError),

    #[error("table construction failed: {0}")]
    Table(String),
}

/// Parameters for one normalization run.
///
/// An empty `tickers` list means the whole resolved universe.
#[derive(Debug, Clone)]
pub struct NormalizeRequest {
    pub tickers: Vec<String>,
    pub timeframe: String,
    pub asset: String,
    pub data_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub full_hour: bool,
    pub use_cache: bool,
}

/// Handle over a finished normalization: a lazy table plus provenance.
pub struct Normalized {
    pub frame: LazyFrame,
    pub key: CacheKey,
    pub cache_hit: bool,
}

impl std::fmt::Debug for Normalized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalized")
            .field("frame", &"<LazyFrame>")
            .field("key", &self.key)
            .field("cache_hit", &self.cache_hit)
            .finish()
    }
}

/// The normalization pipeline.
pub struct Pipeline {
    config: EngineConfig,
    calendar: Box<dyn TradingCalendar>,
    source: Box<dyn BarSource>,
    instruments: Vec<InstrumentRecord>,
    splits: Vec<SplitEvent>,
    cache: CacheStore,
}

impl Pipeline {
    /// Build a pipeline from explicit collaborators. The calendar is
    /// resolved from the config; an unknown name is a hard error.
    pub fn new(
        config: EngineConfig,
        source: Box<dyn BarSource>,
        instruments: Vec<InstrumentRecord>,
        splits: Vec<SplitEvent>,
    ) -> Result<Self, ConfigError> {
        let calendar = crate::calendar::by_name(&config.calendar)?;
        let cache = CacheStore::new(&config.cache_dir);
        Ok(Self {
            config,
            calendar,
            source,
            instruments,
            splits,
            cache,
        })
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Run the full pipeline for one request.
    pub fn normalize(&self, req: &NormalizeRequest) -> Result<Normalized, NormalizeError> {
        let timeframe: Timeframe = req.timeframe.parse()?;
        let params = CacheParams {
            tickers: req.tickers.clone(),
            timeframe: timeframe.to_string(),
            asset: req.asset.clone(),
            data_type: req.data_type.clone(),
            start_date: req.start_date,
            end_date: req.end_date,
            full_hour: req.full_hour,
        };
        let key = CacheStore::key(&params);

        if req.use_cache {
            if let Some(frame) = self.cache.get(&req.asset, &req.data_type, &key) {
                return Ok(Normalized {
                    frame,
                    key,
                    cache_hit: true,
                });
            }
        }

        // ResolveIdentity
        let resolved = self.resolve_universe();
        let load_set = self.load_set(req, &resolved)?;

        // Load
        let raw = self.source.load_bars(
            &req.asset,
            &req.data_type,
            req.start_date,
            req.end_date,
        )?;
        let raw: Vec<Bar> = match &load_set {
            Some(set) => raw
                .into_iter()
                .filter(|b| set.contains(b.ticker.as_str()))
                .collect(),
            None => raw,
        };

        // MergeOverlap
        let merged = self.merge_overlaps(raw, &resolved);

        // Adjust
        let adjusted = adjust(
            merged,
            &self.relabeled_splits(&resolved),
            self.config.price_decimals,
        );

        // BuildGrid → FillGaps → [Resample], per ticker
        let mut by_ticker: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        for bar in adjusted {
            by_ticker.entry(bar.ticker.clone()).or_default().push(bar);
        }
        let groups: Vec<(String, Vec<Bar>)> = by_ticker.into_iter().collect();
        let filled: Vec<Vec<Bar>> = groups
            .par_iter()
            .map(|(ticker, bars)| self.grid_and_fill(ticker, bars, timeframe, req.full_hour))
            .collect();
        let table: Vec<Bar> = filled.into_iter().flatten().collect();

        // CacheWrite
        let mut df = bars_to_dataframe(&table)?;
        let frame = if req.use_cache {
            match put_best_effort(&self.cache, &params, &key, &mut df) {
                Some(_) => self
                    .cache
                    .get(&req.asset, &req.data_type, &key)
                    .unwrap_or_else(|| df.clone().lazy()),
                None => df.lazy(),
            }
        } else {
            df.lazy()
        };

        Ok(Normalized {
            frame,
            key,
            cache_hit: false,
        })
    }

    fn resolve_universe(&self) -> ResolvedUniverse {
        match &self.config.universe {
            Some(filter) => {
                let kept: Vec<InstrumentRecord> = self
                    .instruments
                    .iter()
                    .filter(|r| r.matches(filter))
                    .cloned()
                    .collect();
                resolve(&kept)
            }
            None => resolve(&self.instruments),
        }
    }

    /// The set of tickers whose bars enter the pipeline, or `None` for an
    /// unrestricted load. Requested tickers expand to their whole identity
    /// group; tickers excluded by the universe filter drop out; tickers
    /// unknown to the master pass through untouched.
    fn load_set(
        &self,
        req: &NormalizeRequest,
        resolved: &ResolvedUniverse,
    ) -> Result<Option<HashSet<String>>, NormalizeError> {
        if req.tickers.is_empty() {
            if self.instruments.is_empty() {
                // No master at all: nothing to resolve against, load everything.
                return Ok(None);
            }
            let universe = resolved.all_tickers();
            if universe.is_empty() {
                return Err(NormalizeError::EmptyTickerSet);
            }
            return Ok(Some(universe.into_iter().collect()));
        }

        let known: HashSet<&str> = self.instruments.iter().map(|r| r.ticker.as_str()).collect();
        let mut set: HashSet<String> = HashSet::new();
        for ticker in &req.tickers {
            if resolved.group_of(ticker).is_some() {
                set.extend(resolved.expand(std::slice::from_ref(ticker)));
            } else if !known.contains(ticker.as_str()) {
                set.insert(ticker.clone());
            }
            // Known but filtered out of the universe: excluded.
        }
        if set.is_empty() {
            return Err(NormalizeError::EmptyTickerSet);
        }
        Ok(Some(set))
    }

    /// Collapse rename chains: bars for every member of a group merge into
    /// one non-overlapping history under the group's current symbol.
    fn merge_overlaps(&self, raw: Vec<Bar>, resolved: &ResolvedUniverse) -> Vec<Bar> {
        let mut by_ticker: HashMap<String, Vec<Bar>> = HashMap::new();
        for bar in raw {
            by_ticker.entry(bar.ticker.clone()).or_default().push(bar);
        }

        let mut out: Vec<Bar> = Vec::new();
        for group in &resolved.groups {
            let mut group_bars: HashMap<String, Vec<Bar>> = HashMap::new();
            for member in &group.members {
                if let Some(bars) = by_ticker.remove(&member.ticker) {
                    group_bars.insert(member.ticker.clone(), bars);
                }
            }
            if !group_bars.is_empty() {
                out.extend(merge_group_bars(group, group_bars));
            }
        }
        // Tickers with no master entry pass through as themselves.
        for (_, bars) in by_ticker {
            out.extend(bars);
        }
        out
    }

    /// Split events re-labeled to each group's current symbol, matching
    /// the merged bars.
    fn relabeled_splits(&self, resolved: &ResolvedUniverse) -> Vec<SplitEvent> {
        self.splits
            .iter()
            .map(|s| match resolved.latest_ticker(&s.ticker) {
                Some(latest) if latest != s.ticker => SplitEvent {
                    ticker: latest.to_string(),
                    ..s.clone()
                },
                _ => s.clone(),
            })
            .collect()
    }

    /// Grid over the ticker's realized date range, gap fill, and resample
    /// when the timeframe is a non-native intraday bucket width.
    fn grid_and_fill(
        &self,
        ticker: &str,
        bars: &[Bar],
        timeframe: Timeframe,
        full_hour: bool,
    ) -> Vec<Bar> {
        let Some(first) = bars.first().map(Bar::trade_date) else {
            return Vec::new();
        };
        let last = bars.last().map(Bar::trade_date).unwrap_or(first);

        let grid = build_grid(
            self.calendar.as_ref(),
            first,
            last,
            timeframe.granularity(),
            full_hour,
        );
        let filled = fill_gaps(ticker, &grid, bars);

        match timeframe.bar_minutes() {
            Some(minutes) if !timeframe.is_native() => resample(&filled, minutes),
            _ => filled,
        }
    }
}

/// Materialize bars into the canonical output table.
///
/// Timestamps are stored as epoch nanoseconds (the raw files' convention),
/// keeping artifacts inspectable with any parquet tooling.
pub fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, NormalizeError> {
    let mut timestamps = Vec::with_capacity(bars.len());
    for bar in bars {
        timestamps.push(bar.ts.timestamp_nanos_opt().ok_or_else(|| {
            NormalizeError::Table(format!("timestamp out of range: {}", bar.ts))
        })?);
    }

    let tickers: Vec<&str> = bars.iter().map(|b| b.ticker.as_str()).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<i64> = bars.iter().map(|b| b.volume as i64).collect();
    let transactions: Vec<i64> = bars.iter().map(|b| b.transactions as i64).collect();

    DataFrame::new(vec![
        Column::new("ticker".into(), tickers),
        Column::new("timestamp".into(), timestamps),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("transactions".into(), transactions),
    ])
    .map_err(|e| NormalizeError::Table(e.to_string()))
}
