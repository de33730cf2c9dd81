//! Cache document schema and freshness model.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use gapscan_core::session::SessionMeta;
use gapscan_core::StockSnapshot;

/// The complete cache document, replaced atomically on every commit.
///
/// Symbols are keyed by their canonical uppercase string; `BTreeMap` keeps
/// the serialized document stable across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cache {
    pub stocks: BTreeMap<String, StockSnapshot>,
    /// Unix epoch seconds (fractional) of the commit.
    pub last_update: f64,
    /// Human-readable commit time, exchange-local.
    pub last_update_str: String,
    /// Symbols fetched successfully in the producing scan.
    pub successful_count: usize,
    /// Symbols attempted in the producing scan.
    pub total_count: usize,
    /// Label of the scan that produced this document, e.g. "full" or "forced".
    pub scan_type: String,
    pub market_session: SessionMeta,
    pub scan_summary: ScanStats,
}

impl Cache {
    /// Age of the document relative to `now` (Unix epoch seconds). Clamped
    /// so a hand-edited or garbage `last_update` classifies as old instead
    /// of panicking the reader.
    pub fn age_at(&self, now_epoch: f64) -> Duration {
        // ~31,000 years, far beyond any threshold but well inside Duration.
        const MAX_AGE_SECS: f64 = 1e12;

        let age = now_epoch - self.last_update;
        if age <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(age.min(MAX_AGE_SECS))
        }
    }

    /// True when every priority symbol has an entry.
    pub fn covers(&self, symbols: &[&str]) -> bool {
        symbols.iter().all(|s| self.stocks.contains_key(*s))
    }

    pub fn missing<'a>(&self, symbols: &'a [&'a str]) -> Vec<&'a str> {
        symbols
            .iter()
            .filter(|s| !self.stocks.contains_key(**s))
            .copied()
            .collect()
    }
}

/// Per-pass statistics embedded in the cache document for consumers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_scanned: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percent of attempted symbols that succeeded, 2 decimal places.
    pub success_rate: f64,
    pub scan_duration_seconds: f64,
}

impl ScanStats {
    pub fn new(attempted: usize, succeeded: usize, duration: Duration) -> Self {
        let success_rate = if attempted == 0 {
            0.0
        } else {
            let pct = succeeded as f64 / attempted as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        };
        Self {
            total_scanned: attempted,
            successful: succeeded,
            failed: attempted - succeeded,
            success_rate,
            scan_duration_seconds: duration.as_secs_f64(),
        }
    }
}

/// Outcome counts of one completed scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub insufficient_data: usize,
    pub rate_limited: usize,
    pub transient: usize,
    pub data_errors: usize,
}

impl ScanSummary {
    pub const fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

/// Freshness class of the cache document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Younger than the fresh threshold; consumers can trust it as current.
    Fresh,
    /// Usable but due for refresh.
    Stale,
    /// Older than the stale threshold; treat as historical.
    Old,
    /// No cache document exists.
    NoData,
}

/// Age cutoffs for the freshness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessThresholds {
    pub fresh: Duration,
    pub stale: Duration,
}

impl Default for FreshnessThresholds {
    fn default() -> Self {
        Self {
            fresh: Duration::from_secs(5 * 60),
            stale: Duration::from_secs(30 * 60),
        }
    }
}

impl FreshnessThresholds {
    pub fn classify(&self, age: Duration) -> Freshness {
        if age < self.fresh {
            Freshness::Fresh
        } else if age < self.stale {
            Freshness::Stale
        } else {
            Freshness::Old
        }
    }
}

/// Cache status surfaced to consumers without exposing the raw document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub freshness: Freshness,
    pub age_secs: Option<f64>,
    pub stock_count: usize,
    pub successful_count: usize,
    pub total_count: usize,
    pub scan_type: Option<String>,
    pub last_update_str: Option<String>,
}

impl CacheStatus {
    pub fn no_data() -> Self {
        Self {
            freshness: Freshness::NoData,
            age_secs: None,
            stock_count: 0,
            successful_count: 0,
            total_count: 0,
            scan_type: None,
            last_update_str: None,
        }
    }
}

/// Current Unix epoch seconds with fractional part.
pub fn epoch_now() -> f64 {
    let now = OffsetDateTime::now_utc();
    now.unix_timestamp() as f64 + f64::from(now.nanosecond()) / 1e9
}
