//! The Load boundary: raw partitioned files → typed bars.
//!
//! Raw vendor data is laid out as one file per trading day:
//! `{data_dir}/{asset}/{data_type}/{year}/{month}/{YYYY-MM-DD}.{parquet|csv.gz}`.
//! This module enumerates the partitions for a date range, reads them, and
//! validates the vendor schema exactly once — later stages work on typed
//! records and never re-check column presence.

use crate::domain::{Bar, MARKET_TZ};
use crate::identity::{InstrumentRecord, InstrumentType};
use crate::splits::SplitEvent;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use polars::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Columns every raw bar file must provide.
const RAW_BAR_COLUMNS: [&str; 8] = [
    "ticker",
    "volume",
    "open",
    "close",
    "high",
    "low",
    "window_start",
    "transactions",
];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parquet error in {path}: {message}")]
    Parquet { path: PathBuf, message: String },

    #[error("csv error in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("schema mismatch in {path}: {reason}")]
    SchemaMismatch { path: PathBuf, reason: String },
}

/// Source of raw bars for a date range.
///
/// The partitioned filesystem store is the canonical implementation; tests
/// and alternate storage tiers substitute their own.
pub trait BarSource: Send + Sync {
    fn load_bars(
        &self,
        asset: &str,
        data_type: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, LoadError>;
}

/// Raw bar files partitioned by asset / data type / year / month.
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// All partition files for the range, sorted by date.
    pub fn partition_paths(
        &self,
        asset: &str,
        data_type: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<PathBuf> {
        let mut dated: Vec<(NaiveDate, PathBuf)> = Vec::new();

        for year in start.year()..=end.year() {
            let first_month = if year == start.year() { start.month() } else { 1 };
            let last_month = if year == end.year() { end.month() } else { 12 };

            for month in first_month..=last_month {
                let dir = self
                    .root
                    .join(asset)
                    .join(data_type)
                    .join(year.to_string())
                    .join(format!("{month:02}"));
                let Ok(entries) = fs::read_dir(&dir) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    if !(name.ends_with(".parquet") || name.ends_with(".csv.gz")) {
                        continue;
                    }
                    let Some(stem) = name.split('.').next() else {
                        continue;
                    };
                    let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                        continue;
                    };
                    if date >= start && date <= end {
                        dated.push((date, path));
                    }
                }
            }
        }

        dated.sort();
        dated.into_iter().map(|(_, p)| p).collect()
    }
}

impl BarSource for PartitionStore {
    fn load_bars(
        &self,
        asset: &str,
        data_type: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, LoadError> {
        let mut bars = Vec::new();
        for path in self.partition_paths(asset, data_type, start, end) {
            if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                bars.extend(read_parquet_bars(&path)?);
            } else {
                bars.extend(read_csv_gz_bars(&path)?);
            }
        }
        bars.sort_by(|a, b| a.ticker.cmp(&b.ticker).then_with(|| a.ts.cmp(&b.ts)));
        Ok(bars)
    }
}

/// Read one parquet partition into bars.
pub fn read_parquet_bars(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let df = read_parquet(path)?;
    validate_columns(&df, path, &RAW_BAR_COLUMNS)?;

    let tickers = str_col(&df, path, "ticker")?;
    let opens = f64_col(&df, path, "open")?;
    let highs = f64_col(&df, path, "high")?;
    let lows = f64_col(&df, path, "low")?;
    let closes = f64_col(&df, path, "close")?;
    let volumes = i64_col(&df, path, "volume")?;
    let transactions = i64_col(&df, path, "transactions")?;
    let window_starts = i64_col(&df, path, "window_start")?;

    let mut bars = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let ticker = tickers.get(i).ok_or_else(|| LoadError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: format!("null ticker at row {i}"),
        })?;
        bars.push(Bar {
            ticker: ticker.to_string(),
            ts: DateTime::from_timestamp_nanos(window_starts[i]).with_timezone(&MARKET_TZ),
            open: opens[i],
            high: highs[i],
            low: lows[i],
            close: closes[i],
            volume: volumes[i].max(0) as u64,
            transactions: transactions[i].max(0) as u64,
        });
    }
    Ok(bars)
}

#[derive(Debug, Deserialize)]
struct RawCsvRow {
    ticker: String,
    volume: i64,
    open: f64,
    close: f64,
    high: f64,
    low: f64,
    window_start: i64,
    transactions: i64,
}

/// Read one gzip-compressed CSV partition into bars.
pub fn read_csv_gz_bars(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut reader = csv::Reader::from_reader(decoder);

    let mut bars = Vec::new();
    for row in reader.deserialize::<RawCsvRow>() {
        let row = row.map_err(|e| LoadError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        bars.push(Bar {
            ticker: row.ticker,
            ts: DateTime::from_timestamp_nanos(row.window_start).with_timezone(&MARKET_TZ),
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.max(0) as u64,
            transactions: row.transactions.max(0) as u64,
        });
    }
    Ok(bars)
}

/// Load the instrument master list (tickers, types, identifiers).
pub fn load_instrument_master(path: &Path) -> Result<Vec<InstrumentRecord>, LoadError> {
    let df = read_parquet(path)?;
    validate_columns(
        &df,
        path,
        &[
            "ticker",
            "type",
            "active",
            "delisted_utc",
            "composite_figi",
            "share_class_figi",
            "last_updated_utc",
        ],
    )?;

    let tickers = str_col(&df, path, "ticker")?;
    let types = str_col(&df, path, "type")?;
    let actives = df
        .column("active")
        .and_then(|c| c.bool().cloned())
        .map_err(|e| LoadError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: format!("column 'active': {e}"),
        })?;
    let delisted = str_col(&df, path, "delisted_utc")?;
    let composites = str_col(&df, path, "composite_figi")?;
    let share_classes = str_col(&df, path, "share_class_figi")?;
    let updated = str_col(&df, path, "last_updated_utc")?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let ticker = tickers.get(i).unwrap_or_default();
        let last_updated = updated
            .get(i)
            .and_then(parse_utc)
            .ok_or_else(|| LoadError::SchemaMismatch {
                path: path.to_path_buf(),
                reason: format!("unparseable last_updated_utc at row {i}"),
            })?;
        records.push(InstrumentRecord {
            ticker: ticker.to_string(),
            instrument_type: InstrumentType::from_code(types.get(i).unwrap_or("UNKNOWN")),
            active: actives.get(i).unwrap_or(false),
            composite_id: composites.get(i).map(String::from),
            share_class_id: share_classes.get(i).map(String::from),
            last_updated,
            delisted_at: delisted.get(i).and_then(parse_utc),
        });
    }
    Ok(records)
}

/// Load the split feed.
pub fn load_splits(path: &Path) -> Result<Vec<SplitEvent>, LoadError> {
    let df = read_parquet(path)?;
    validate_columns(
        &df,
        path,
        &["execution_date", "split_from", "split_to", "ticker"],
    )?;

    let tickers = str_col(&df, path, "ticker")?;
    let dates = str_col(&df, path, "execution_date")?;
    let froms = f64_col(&df, path, "split_from")?;
    let tos = f64_col(&df, path, "split_to")?;

    let mut splits = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let date_str = dates.get(i).ok_or_else(|| LoadError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: format!("null execution_date at row {i}"),
        })?;
        let execution_date =
            NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| {
                LoadError::SchemaMismatch {
                    path: path.to_path_buf(),
                    reason: format!("unparseable execution_date '{date_str}' at row {i}"),
                }
            })?;
        splits.push(SplitEvent {
            ticker: tickers.get(i).unwrap_or_default().to_string(),
            execution_date,
            split_from: froms[i],
            split_to: tos[i],
        });
    }
    Ok(splits)
}

fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

// ── Column helpers ──────────────────────────────────────────────────

fn read_parquet(path: &Path) -> Result<DataFrame, LoadError> {
    let file = fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| LoadError::Parquet {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn validate_columns(df: &DataFrame, path: &Path, required: &[&str]) -> Result<(), LoadError> {
    for name in required {
        if df.column(name).is_err() {
            return Err(LoadError::SchemaMismatch {
                path: path.to_path_buf(),
                reason: format!("missing column '{name}'"),
            });
        }
    }
    Ok(())
}

fn str_col(df: &DataFrame, path: &Path, name: &str) -> Result<StringChunked, LoadError> {
    df.column(name)
        .and_then(|c| c.str().cloned())
        .map_err(|e| LoadError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: format!("column '{name}': {e}"),
        })
}

fn f64_col(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<f64>, LoadError> {
    let col = df
        .column(name)
        .and_then(|c| c.cast(&DataType::Float64))
        .map_err(|e| LoadError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: format!("column '{name}': {e}"),
        })?;
    let ca = col.f64().map_err(|e| LoadError::SchemaMismatch {
        path: path.to_path_buf(),
        reason: format!("column '{name}': {e}"),
    })?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn i64_col(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<i64>, LoadError> {
    let col = df
        .column(name)
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(|e| LoadError::SchemaMismatch {
            path: path.to_path_buf(),
            reason: format!("column '{name}': {e}"),
        })?;
    let ca = col.i64().map_err(|e| LoadError::SchemaMismatch {
        path: path.to_path_buf(),
        reason: format!("column '{name}': {e}"),
    })?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(0)).collect())
}
