//! Content-addressed cache for normalized tables.
//!
//! The key is a BLAKE3 digest of the canonical request serialization
//! (sorted tickers, normalized timeframe token, stable field order) — a
//! cache index, not a security boundary. Artifacts are parquet files with
//! a JSON sidecar carrying the original parameters for human debugging.
//!
//! Writes publish atomically (write to .tmp, rename into place), so a
//! concurrent writer for the same key can duplicate work but never corrupt
//! the artifact: last writer wins. Any cache I/O failure degrades to
//! recompute-without-caching and is never surfaced to the caller.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("cache serialization error: {0}")]
    Serialization(String),
}

/// Canonical, hashable form of a normalization request.
///
/// Field order is part of the format: the serialization (and therefore the
/// key) is stable across processes as long as this struct does not change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheParams {
    pub tickers: Vec<String>,
    pub timeframe: String,
    pub asset: String,
    pub data_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub full_hour: bool,
}

/// 256-bit content key, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

/// Sidecar metadata written next to every artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub params: CacheParams,
    pub key: CacheKey,
    pub created_at: chrono::NaiveDateTime,
}

/// The normalized-artifact cache.
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Derive the content key for a request.
    ///
    /// Tickers are sorted and de-duplicated before hashing so that
    /// `["B","A"]` and `["A","B"]` address the same artifact.
    pub fn key(params: &CacheParams) -> CacheKey {
        let mut canonical = params.clone();
        canonical.tickers.sort_unstable();
        canonical.tickers.dedup();
        let json = serde_json::to_string(&canonical).expect("CacheParams must serialize");
        CacheKey(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Artifact path: `{cache_dir}/{asset}/{data_type}/cache_{key}.parquet`.
    pub fn artifact_path(&self, asset: &str, data_type: &str, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(asset)
            .join(data_type)
            .join(format!("cache_{}.parquet", key.as_hex()))
    }

    fn metadata_path(&self, asset: &str, data_type: &str, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(asset)
            .join(data_type)
            .join(format!("cache_{}_metadata.json", key.as_hex()))
    }

    /// Look up an artifact. Returns a lazy scan when it exists and is
    /// readable; unreadable artifacts degrade to a miss with a warning.
    pub fn get(&self, asset: &str, data_type: &str, key: &CacheKey) -> Option<LazyFrame> {
        let path = self.artifact_path(asset, data_type, key);
        if !path.exists() {
            return None;
        }
        match LazyFrame::scan_parquet(&path, Default::default()) {
            Ok(frame) => Some(frame),
            Err(e) => {
                eprintln!(
                    "WARNING: unreadable cache artifact {}: {e}; recomputing",
                    path.display()
                );
                None
            }
        }
    }

    /// Persist an artifact and its sidecar. The parquet file is fully
    /// written to a temp path before the rename makes it visible.
    pub fn put(
        &self,
        params: &CacheParams,
        key: &CacheKey,
        table: &mut DataFrame,
    ) -> Result<PathBuf, CacheError> {
        let path = self.artifact_path(&params.asset, &params.data_type, key);
        let dir = path.parent().ok_or_else(|| CacheError::Io {
            path: path.clone(),
            message: "artifact path has no parent".into(),
        })?;
        fs::create_dir_all(dir).map_err(|e| CacheError::Io {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let tmp_path = path.with_extension("parquet.tmp");
        let file = fs::File::create(&tmp_path).map_err(|e| CacheError::Io {
            path: tmp_path.clone(),
            message: e.to_string(),
        })?;
        ParquetWriter::new(file)
            .finish(table)
            .map_err(|e| CacheError::Io {
                path: tmp_path.clone(),
                message: e.to_string(),
            })?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CacheError::Io {
                path: path.clone(),
                message: format!("atomic rename failed: {e}"),
            }
        })?;

        let metadata = CacheMetadata {
            params: params.clone(),
            key: key.clone(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let meta_path = self.metadata_path(&params.asset, &params.data_type, key);
        fs::write(&meta_path, json).map_err(|e| CacheError::Io {
            path: meta_path,
            message: e.to_string(),
        })?;

        Ok(path)
    }

    /// Sidecar records for every artifact under an asset/data type, for
    /// inspection tooling. Unreadable sidecars are skipped.
    pub fn entries(&self, asset: &str, data_type: &str) -> Vec<CacheMetadata> {
        let dir = self.cache_dir.join(asset).join(data_type);
        let Ok(read) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut entries: Vec<CacheMetadata> = read
            .flatten()
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with("_metadata.json"))
            })
            .filter_map(|e| {
                let content = fs::read_to_string(e.path()).ok()?;
                serde_json::from_str(&content).ok()
            })
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        entries
    }
}

/// Log-and-continue wrapper for the soft-fail write path.
pub fn put_best_effort(
    store: &CacheStore,
    params: &CacheParams,
    key: &CacheKey,
    table: &mut DataFrame,
) -> Option<PathBuf> {
    match store.put(params, key, table) {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("WARNING: cache write failed ({e}); returning uncached result");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("barlab_cache_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_params() -> CacheParams {
        CacheParams {
            tickers: vec!["NVDA".into(), "AAPL".into()],
            timeframe: "1d".into(),
            asset: "us_stocks_sip".into(),
            data_type: "day_aggs_v1".into(),
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
            full_hour: false,
        }
    }

    fn sample_table() -> DataFrame {
        df!(
            "ticker" => vec!["AAPL".to_string(), "NVDA".to_string()],
            "timestamp" => vec![1_609_772_400_000_000_000i64, 1_609_772_400_000_000_000],
            "close" => vec![129.41, 131.01],
        )
        .unwrap()
    }

    #[test]
    fn key_is_deterministic() {
        assert_eq!(CacheStore::key(&sample_params()), CacheStore::key(&sample_params()));
    }

    #[test]
    fn key_ignores_ticker_order() {
        let mut reordered = sample_params();
        reordered.tickers.reverse();
        assert_eq!(CacheStore::key(&sample_params()), CacheStore::key(&reordered));
    }

    #[test]
    fn key_changes_with_any_parameter() {
        let base = CacheStore::key(&sample_params());

        let mut p = sample_params();
        p.timeframe = "5m".into();
        assert_ne!(base, CacheStore::key(&p));

        let mut p = sample_params();
        p.full_hour = true;
        assert_ne!(base, CacheStore::key(&p));

        let mut p = sample_params();
        p.end_date = NaiveDate::from_ymd_opt(2021, 2, 28).unwrap();
        assert_ne!(base, CacheStore::key(&p));
    }

    #[test]
    fn put_then_get_roundtrip() {
        let dir = temp_cache_dir();
        let store = CacheStore::new(&dir);
        let params = sample_params();
        let key = CacheStore::key(&params);

        let mut table = sample_table();
        let path = store.put(&params, &key, &mut table).unwrap();
        assert!(path.exists());

        let frame = store.get(&params.asset, &params.data_type, &key).unwrap();
        let loaded = frame.collect().unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.column("ticker").unwrap().str().unwrap().get(0), Some("AAPL"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn get_misses_when_absent() {
        let dir = temp_cache_dir();
        let store = CacheStore::new(&dir);
        let key = CacheStore::key(&sample_params());
        assert!(store.get("us_stocks_sip", "day_aggs_v1", &key).is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn sidecar_metadata_preserves_params() {
        let dir = temp_cache_dir();
        let store = CacheStore::new(&dir);
        let params = sample_params();
        let key = CacheStore::key(&params);
        store.put(&params, &key, &mut sample_table()).unwrap();

        let entries = store.entries(&params.asset, &params.data_type);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].params, params);
        assert_eq!(entries[0].key, key);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_failure_degrades_without_error() {
        // Point the cache at a path that cannot be a directory.
        let dir = temp_cache_dir();
        let blocker = dir.join("blocked");
        fs::write(&blocker, b"not a directory").unwrap();

        let store = CacheStore::new(&blocker);
        let params = sample_params();
        let key = CacheStore::key(&params);
        assert!(put_best_effort(&store, &params, &key, &mut sample_table()).is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn no_tmp_files_remain_after_put() {
        let dir = temp_cache_dir();
        let store = CacheStore::new(&dir);
        let params = sample_params();
        let key = CacheStore::key(&params);
        store.put(&params, &key, &mut sample_table()).unwrap();

        let artifact_dir = dir.join(&params.asset).join(&params.data_type);
        let leftovers: Vec<_> = fs::read_dir(artifact_dir)
            .unwrap()
            .flatten()
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }
}
