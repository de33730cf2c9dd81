//! Shared helpers for the gapscan behavior test suites.

use std::sync::Arc;
use std::time::Duration;

use gapscan_core::{MarketSession, StockSnapshot, Symbol, UtcDateTime, YahooAdapter};
use gapscan_daemon::ScannerConfig;
use gapscan_store::CacheStore;
use tempfile::TempDir;

/// Offline adapter in deterministic fake mode.
pub fn fake_adapter() -> Arc<YahooAdapter> {
    Arc::new(YahooAdapter::default())
}

/// A config with all delays collapsed so suites run in milliseconds.
pub fn fast_config(max_symbols: usize) -> ScannerConfig {
    ScannerConfig {
        scan_interval: Duration::from_millis(10),
        max_symbols,
        request_delay: Duration::from_millis(1),
        cooldown_every: 0,
        cooldown: Duration::ZERO,
        failure_cooldown: Duration::ZERO,
        max_retries: 0,
        retry_base_delay: Duration::from_millis(1),
        ..ScannerConfig::default()
    }
}

/// A cache store rooted in a fresh temp directory. The directory guard must
/// outlive the store.
pub fn temp_store() -> (TempDir, CacheStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CacheStore::new(dir.path().join("stock_cache.json"));
    (dir, store)
}

/// A well-formed snapshot for seeding cache documents.
pub fn sample_snapshot(symbol: &str) -> StockSnapshot {
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
