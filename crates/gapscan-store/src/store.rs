//! File-backed cache store with atomic replacement.
//!
//! Commits write the whole document to a temp file in the cache's own
//! directory, persist it over the target path, then re-read and parse the
//! result. Readers therefore never observe a torn or truncated document.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::{epoch_now, Cache, CacheStatus, FreshnessThresholds};

/// Atomic file-backed store for the scan cache document.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    thresholds: FreshnessThresholds,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            thresholds: FreshnessThresholds::default(),
        }
    }

    pub fn with_thresholds(path: impl Into<PathBuf>, thresholds: FreshnessThresholds) -> Self {
        Self {
            path: path.into(),
            thresholds,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the cache document and verify the result.
    ///
    /// An empty snapshot collection is rejected outright: replacing the last
    /// good document with `{}` would blind every reader. The temp file lives
    /// in the target's directory so the final rename never crosses a
    /// filesystem boundary.
    pub fn save(&self, cache: &Cache) -> Result<(), StoreError> {
        if cache.stocks.is_empty() {
            return Err(StoreError::EmptyDocument {
                path: self.path.clone(),
            });
        }

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let body = serde_json::to_string_pretty(cache)?;

        let temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        fs::write(temp.path(), &body).map_err(|e| StoreError::io(temp.path(), e))?;

        temp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;

        // Verify the committed bytes parse back; a failure here means the
        // document on disk is not trustworthy.
        let committed = fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let reread: Cache =
            serde_json::from_str(&committed).map_err(|e| StoreError::VerificationFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        if reread.stocks.len() != cache.stocks.len() {
            return Err(StoreError::VerificationFailed {
                path: self.path.clone(),
                reason: format!(
                    "stock count mismatch: wrote {}, read back {}",
                    cache.stocks.len(),
                    reread.stocks.len()
                ),
            });
        }

        debug!(
            path = %self.path.display(),
            stocks = cache.stocks.len(),
            scan_type = %cache.scan_type,
            "cache committed"
        );
        Ok(())
    }

    /// Load the cache document. A missing file is `None`; an unreadable or
    /// unparsable file is logged and treated as absent, never fatal.
    pub fn load(&self) -> Option<Cache> {
        let body = match fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache unreadable, ignoring");
                return None;
            }
        };

        match serde_json::from_str(&body) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache corrupt, ignoring");
                None
            }
        }
    }

    /// All symbols present in the current document, sorted.
    pub fn symbols(&self) -> Vec<String> {
        self.load()
            .map(|cache| cache.stocks.into_keys().collect())
            .unwrap_or_default()
    }

    /// One symbol's snapshot from the current document.
    pub fn snapshot(&self, symbol: &str) -> Option<gapscan_core::StockSnapshot> {
        self.load()?.stocks.remove(symbol)
    }

    /// Delete the cache document if present.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Freshness and counts at the given epoch instant.
    pub fn status_at(&self, now_epoch: f64) -> CacheStatus {
        match self.load() {
            None => CacheStatus::no_data(),
            Some(cache) => {
                let age = cache.age_at(now_epoch);
                CacheStatus {
                    freshness: self.thresholds.classify(age),
                    age_secs: Some(age.as_secs_f64()),
                    stock_count: cache.stocks.len(),
                    successful_count: cache.successful_count,
                    total_count: cache.total_count,
                    scan_type: Some(cache.scan_type),
                    last_update_str: Some(cache.last_update_str),
                }
            }
        }
    }

    pub fn status(&self) -> CacheStatus {
        self.status_at(epoch_now())
    }

    pub fn thresholds(&self) -> FreshnessThresholds {
        self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use gapscan_core::session::SessionMeta;
    use gapscan_core::{MarketSession, StockSnapshot, Symbol, UtcDateTime};

    use crate::models::{Freshness, ScanStats};

    fn sample_snapshot(symbol: &str) -> StockSnapshot {
        StockSnapshot {
            symbol: Symbol::parse(symbol).expect("valid test symbol"),
            price: 150.0,
            prev_close: 145.0,
            gap_pct: 3.45,
            volume: 3_000_000,
            volume_display: String::from("3.0M"),
            avg_volume: 2_000_000,
            rel_volume: 1.5,
            market_cap: Some(2_000_000_000.0),
            market_cap_display: String::from("$2.0B"),
            float_shares: None,
            float_display: String::from("—"),
            pe_ratio: None,
            sector: String::from("Technology"),
            industry: String::from("Semiconductors"),
            category: String::from("Semiconductors"),
            gap_classification: String::from("REGULAR"),
            pre_market_price: None,
            pre_market_change_pct: None,
            post_market_price: None,
            post_market_change_pct: None,
            market_state: MarketSession::Regular,
            data_fetch_time: UtcDateTime::parse("2026-08-21T14:00:00Z").expect("valid"),
            fetch_duration_ms: 12.0,
        }
    }

    fn sample_cache(last_update: f64) -> Cache {
        let mut stocks = BTreeMap::new();
        stocks.insert(String::from("AAPL"), sample_snapshot("AAPL"));
        Cache {
            stocks,
            last_update,
            last_update_str: String::from("2026-08-21 10:00:00 ET"),
            successful_count: 1,
            total_count: 2,
            scan_type: String::from("full"),
            market_session: SessionMeta {
                session: MarketSession::Regular,
                current_time_et: String::from("2026-08-21 10:00:00 ET"),
                is_trading_day: true,
            },
            scan_summary: ScanStats::default(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path().join("cache.json"));

        let cache = sample_cache(1_000.0);
        store.save(&cache).expect("save succeeds");

        let loaded = store.load().expect("cache exists");
        assert_eq!(loaded, cache);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_none());
        assert_eq!(store.status().freshness, Freshness::NoData);
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        fs::write(&path, "{\"stocks\": truncated").expect("write garbage");

        let store = CacheStore::new(&path);
        assert!(store.load().is_none());
    }

    #[test]
    fn save_replaces_previous_document_atomically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path().join("cache.json"));

        store.save(&sample_cache(1_000.0)).expect("first save");
        store.save(&sample_cache(2_000.0)).expect("second save");

        let loaded = store.load().expect("cache exists");
        assert_eq!(loaded.last_update, 2_000.0);

        // No temp files left behind.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != "cache.json")
            .collect();
        assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");
    }

    #[test]
    fn empty_document_is_rejected_and_previous_survives() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path().join("cache.json"));
        store.save(&sample_cache(1_000.0)).expect("seed");

        let mut empty = sample_cache(2_000.0);
        empty.stocks.clear();
        let error = store.save(&empty).expect_err("empty commit must be rejected");
        assert!(matches!(error, StoreError::EmptyDocument { .. }));

        let loaded = store.load().expect("previous document intact");
        assert_eq!(loaded.last_update, 1_000.0);
        assert_eq!(loaded.stocks.len(), 1);
    }

    #[test]
    fn status_classifies_by_age() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path().join("cache.json"));
        store.save(&sample_cache(10_000.0)).expect("save");

        assert_eq!(
            store.status_at(10_000.0 + 4.0 * 60.0 + 59.0).freshness,
            Freshness::Fresh
        );
        assert_eq!(
            store.status_at(10_000.0 + 5.0 * 60.0 + 1.0).freshness,
            Freshness::Stale
        );
        assert_eq!(
            store.status_at(10_000.0 + 29.0 * 60.0 + 59.0).freshness,
            Freshness::Stale
        );
        assert_eq!(
            store.status_at(10_000.0 + 30.0 * 60.0 + 1.0).freshness,
            Freshness::Old
        );
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CacheStore::new(dir.path().join("cache.json"));

        store.save(&sample_cache(1_000.0)).expect("save");
        store.clear().expect("first clear");
        store.clear().expect("second clear is a no-op");
        assert!(store.load().is_none());
    }
}
