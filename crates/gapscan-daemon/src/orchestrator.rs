//! Scan orchestration: the periodic loop, completeness enforcement, and
//! cache commits.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tracing::{error, info, warn};

use gapscan_core::fetcher::{FetchErrorKind, Fetcher};
use gapscan_core::provider::QuoteProvider;
use gapscan_core::session::{ExchangeClock, SessionMeta};
use gapscan_core::universe::{UniverseBuilder, PRIORITY_SYMBOLS};
use gapscan_core::{Pacer, Shutdown, Symbol, UtcDateTime};
use gapscan_store::{epoch_now, Cache, CacheStore, Freshness, ScanStats, ScanSummary};

use crate::config::ScannerConfig;

/// Label for the regular periodic scan.
const SCAN_TYPE_FULL: &str = "full";
/// Label for a scan forced by an incomplete cache.
const SCAN_TYPE_FORCED: &str = "forced";

/// Record of one completed scan pass.
#[derive(Debug, Clone)]
pub struct ScanRun {
    pub started_at: UtcDateTime,
    pub duration: Duration,
    pub summary: ScanSummary,
    pub failed_symbols: Vec<String>,
    pub session: SessionMeta,
}

/// The background scanner: builds the universe, fetches each symbol in
/// sequence under pacing, and commits the result atomically.
pub struct Scanner {
    provider: Arc<dyn QuoteProvider>,
    store: CacheStore,
    config: ScannerConfig,
    shutdown: Shutdown,
    fetcher: Fetcher,
    pacer: Pacer,
    clock: ExchangeClock,
}

impl Scanner {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        store: CacheStore,
        config: ScannerConfig,
        shutdown: Shutdown,
    ) -> Self {
        let fetcher = Fetcher::new(
            Arc::clone(&provider),
            config.retry_config(),
            shutdown.clone(),
        );
        let pacer = Pacer::new(config.pacing_config());

        Self {
            provider,
            store,
            config,
            shutdown,
            fetcher,
            pacer,
            clock: ExchangeClock,
        }
    }

    /// Run the periodic scan loop until shutdown.
    ///
    /// A fresh cache at startup defers the first scan by one interval, so a
    /// quick restart does not burn the rate budget re-fetching current data.
    pub async fn run(&self) {
        let status = self.store.status();
        if status.freshness == Freshness::Fresh && self.cache_is_complete() {
            info!(
                age_secs = status.age_secs,
                stocks = status.stock_count,
                "cache is fresh and complete, deferring first scan"
            );
            if !self.shutdown.sleep(self.config.scan_interval).await {
                return;
            }
        }

        while !self.shutdown.is_triggered() {
            let scan_type = self.resolve_scan_type();
            self.scan_once(scan_type).await;

            if !self.shutdown.sleep(self.config.scan_interval).await {
                break;
            }
        }
        info!("scan loop stopped");
    }

    /// Decide the label for the next scan. An existing cache missing any
    /// priority symbol is cleared and the scan is forced.
    fn resolve_scan_type(&self) -> &'static str {
        let Some(cache) = self.store.load() else {
            return SCAN_TYPE_FULL;
        };

        let missing = cache.missing(PRIORITY_SYMBOLS);
        if missing.is_empty() {
            return SCAN_TYPE_FULL;
        }

        warn!(?missing, "cache missing priority symbols, forcing full rescan");
        if let Err(e) = self.store.clear() {
            error!(error = %e, "failed to clear incomplete cache");
        }
        SCAN_TYPE_FORCED
    }

    fn cache_is_complete(&self) -> bool {
        self.store
            .load()
            .map(|c| c.covers(PRIORITY_SYMBOLS))
            .unwrap_or(false)
    }

    /// One scan pass over the universe, ending in an atomic cache commit.
    /// Interrupted passes still commit whatever they fetched; a pass that
    /// fetched nothing leaves the previous document in place.
    pub async fn scan_once(&self, scan_type: &str) -> ScanRun {
        let started_at = UtcDateTime::now();
        let started = Instant::now();
        let universe = UniverseBuilder::new(Arc::clone(&self.provider), self.config.max_symbols)
            .build()
            .await;
        info!(symbols = universe.len(), scan_type, "scan pass starting");

        let mut stocks = BTreeMap::new();
        let mut summary = ScanSummary::default();
        let mut failed_symbols = Vec::new();
        let mut consecutive_failures = 0u32;

        for (i, symbol) in universe.iter().enumerate() {
            if self.shutdown.is_triggered() {
                info!(
                    fetched = summary.attempted,
                    remaining = universe.len() - summary.attempted,
                    "shutdown requested, ending scan pass early"
                );
                break;
            }

            let delay = self
                .pacer
                .delay_before((i + 1) as u32, consecutive_failures);
            if !self.shutdown.sleep(delay).await {
                break;
            }
            if !self.wait_for_budget().await {
                break;
            }

            summary.attempted += 1;
            match self.fetcher.fetch(symbol).await {
                Ok(snapshot) => {
                    summary.succeeded += 1;
                    consecutive_failures = 0;
                    stocks.insert(symbol.as_str().to_string(), snapshot);
                }
                Err(error) => {
                    consecutive_failures += 1;
                    failed_symbols.push(symbol.as_str().to_string());
                    match error.kind() {
                        FetchErrorKind::InsufficientData => summary.insufficient_data += 1,
                        FetchErrorKind::RateLimited => summary.rate_limited += 1,
                        FetchErrorKind::Transient => summary.transient += 1,
                        FetchErrorKind::Data => summary.data_errors += 1,
                    }
                    warn!(symbol = %symbol, error = %error, "symbol fetch failed");
                }
            }
        }

        let duration = started.elapsed();
        let session = self.commit(stocks, &summary, duration, scan_type, &universe);
        ScanRun {
            started_at,
            duration,
            summary,
            failed_symbols,
            session,
        }
    }

    /// Spin on the hard rate budget, sleeping the suggested delay between
    /// attempts. Returns `false` when interrupted by shutdown.
    async fn wait_for_budget(&self) -> bool {
        while let Err(wait) = self.pacer.acquire_budget() {
            if !self.shutdown.sleep(wait).await {
                return false;
            }
        }
        true
    }

    /// Commit the scan result. An empty result set never commits, so a
    /// shutdown before the first fetch cannot wipe the last good document.
    /// A commit failure is logged, never fatal: the previous document stays
    /// intact and the next pass tries again.
    fn commit(
        &self,
        stocks: BTreeMap<String, gapscan_core::StockSnapshot>,
        summary: &ScanSummary,
        duration: Duration,
        scan_type: &str,
        universe: &[Symbol],
    ) -> SessionMeta {
        let meta = SessionMeta::capture(OffsetDateTime::now_utc(), &self.clock);

        if stocks.is_empty() {
            warn!(
                attempted = summary.attempted,
                scan_type, "no snapshots fetched, keeping previous cache document"
            );
            return meta;
        }

        let cache = Cache {
            stocks,
            last_update: epoch_now(),
            last_update_str: meta.current_time_et.clone(),
            successful_count: summary.succeeded,
            total_count: summary.attempted,
            scan_type: scan_type.to_string(),
            market_session: meta.clone(),
            scan_summary: ScanStats::new(summary.attempted, summary.succeeded, duration),
        };

        match self.store.save(&cache) {
            Ok(()) => {
                info!(
                    succeeded = summary.succeeded,
                    attempted = summary.attempted,
                    failed = summary.failed(),
                    insufficient_data = summary.insufficient_data,
                    rate_limited = summary.rate_limited,
                    transient = summary.transient,
                    data_errors = summary.data_errors,
                    scan_type,
                    "scan pass committed"
                );

                let priority_in_universe: Vec<&str> = PRIORITY_SYMBOLS
                    .iter()
                    .filter(|p| universe.iter().any(|s| s.as_str() == **p))
                    .copied()
                    .collect();
                let missing = cache.missing(&priority_in_universe);
                if !missing.is_empty() {
                    warn!(?missing, "committed cache is missing priority symbols");
                }
            }
            Err(e) => {
                error!(error = %e, "cache commit failed, keeping previous document");
            }
        }

        meta
    }
}
