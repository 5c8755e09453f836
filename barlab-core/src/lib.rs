//! BarLab Core — market-data normalization and caching engine.
//!
//! Turns raw partitioned equity bars into analysis-ready tables:
//! - Identity resolution across ticker renames (bipartite FIGI graph)
//! - Corporate-action (split) back-adjustment
//! - Exchange-calendar expected-timestamp grids
//! - Gap filling with forward-filled flat bars
//! - Session-bounded resampling to coarser timeframes
//! - Content-addressed parquet cache with JSON sidecars
//!
//! The [`pipeline::Pipeline`] composes the stages; everything else is a
//! pure transformation over typed bar records.

pub mod cache;
pub mod calendar;
pub mod config;
pub mod domain;
pub mod gapfill;
pub mod identity;
pub mod load;
pub mod pipeline;
pub mod resample;
pub mod splits;
pub mod timeframe;

pub use cache::{CacheKey, CacheParams, CacheStore};
pub use config::{ConfigError, EngineConfig, UniverseFilter};
pub use domain::{Bar, MARKET_TZ};
pub use identity::{InstrumentRecord, InstrumentType};
pub use load::{BarSource, LoadError, PartitionStore};
pub use pipeline::{Normalized, NormalizeError, NormalizeRequest, Pipeline};
pub use splits::SplitEvent;
pub use timeframe::Timeframe;
