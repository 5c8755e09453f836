//! Engine configuration.
//!
//! Everything the pipeline needs to know about its environment lives in an
//! explicit [`EngineConfig`] passed to the constructor — there are no
//! module-level path constants. Configs are TOML-loadable for tooling.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors are hard failures: the pipeline aborts with context
/// rather than guessing at intent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid timeframe token '{0}' (expected e.g. '1m', '5m', '1h', '1d', '1w')")]
    InvalidTimeframe(String),

    #[error("unknown calendar '{0}'")]
    UnknownCalendar(String),

    #[error("calendar range error: {0}")]
    CalendarRange(String),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Restricts the instrument master before identity resolution.
///
/// `types` holds vendor type codes (e.g. "CS", "ADRC"); an instrument is
/// kept when its type matches and it is either active or was delisted
/// after `delisted_after`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UniverseFilter {
    pub types: Vec<String>,
    pub delisted_after: Option<NaiveDate>,
}

impl UniverseFilter {
    /// Common stocks and ADRs, the default equity research universe.
    pub fn common_stocks(delisted_after: Option<NaiveDate>) -> Self {
        Self {
            types: vec!["CS".into(), "ADRC".into()],
            delisted_after,
        }
    }
}

/// Engine configuration passed to the pipeline constructor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Root of the raw partitioned bar files:
    /// `{data_dir}/{asset}/{data_type}/{year}/{month}/{date}.{parquet|csv.gz}`.
    pub data_dir: PathBuf,

    /// Root of the normalized artifact cache.
    pub cache_dir: PathBuf,

    /// Calendar name resolved via [`crate::calendar::by_name`].
    #[serde(default = "default_calendar")]
    pub calendar: String,

    /// Decimal places for adjusted prices.
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,

    /// Optional instrument-master restriction applied before resolution.
    #[serde(default)]
    pub universe: Option<UniverseFilter>,
}

fn default_calendar() -> String {
    "XNYS".into()
}

fn default_price_decimals() -> u32 {
    4
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache_dir: cache_dir.into(),
            calendar: default_calendar(),
            price_decimals: default_price_decimals(),
            universe: None,
        }
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
