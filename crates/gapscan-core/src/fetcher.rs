//! Per-symbol fetch pipeline: provider calls, retry, and snapshot assembly.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::domain::{
    categorize, classify_gap, format_count, format_dollars, gap_percent, relative_volume,
    StockSnapshot,
};
use crate::provider::{ProviderError, ProviderErrorKind, QuoteProvider};
use crate::retry::{RetryAction, RetryConfig};
use crate::session::{classify, ExchangeClock, MarketSession};
use crate::shutdown::Shutdown;
use crate::{Symbol, UtcDateTime};

/// Daily bars needed to derive a gap: the latest close and the one before it.
const HISTORY_DAYS: u32 = 2;

/// Failure class for one symbol's fetch, after retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Fewer than two daily bars; the gap cannot be derived. Never retried.
    InsufficientData,
    RateLimited,
    Transient,
    Data,
}

impl FetchErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientData => "insufficient_data",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Data => "data",
        }
    }
}

impl From<ProviderErrorKind> for FetchErrorKind {
    fn from(kind: ProviderErrorKind) -> Self {
        match kind {
            ProviderErrorKind::RateLimited => Self::RateLimited,
            ProviderErrorKind::Transient => Self::Transient,
            ProviderErrorKind::Data => Self::Data,
        }
    }
}

/// Terminal fetch failure for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    symbol: Symbol,
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    fn new(symbol: &Symbol, kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            symbol: symbol.clone(),
            kind,
            message: message.into(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.symbol, self.kind.as_str(), self.message)
    }
}

impl std::error::Error for FetchError {}

/// Fetches one symbol at a time: provider quote + short daily history, with
/// retry on transient and rate-limit failures, producing a complete
/// [`StockSnapshot`] or a classified [`FetchError`].
pub struct Fetcher {
    provider: Arc<dyn QuoteProvider>,
    retry: RetryConfig,
    clock: ExchangeClock,
    shutdown: Shutdown,
}

impl Fetcher {
    pub fn new(provider: Arc<dyn QuoteProvider>, retry: RetryConfig, shutdown: Shutdown) -> Self {
        Self {
            provider,
            retry,
            clock: ExchangeClock,
            shutdown,
        }
    }

    /// Fetch one symbol, retrying per policy. Sleeps between attempts are
    /// shutdown-aware; a triggered shutdown surfaces as a transient failure.
    pub async fn fetch(&self, symbol: &Symbol) -> Result<StockSnapshot, FetchError> {
        let mut attempt = 0u32;

        loop {
            let started = Instant::now();
            match self.fetch_once(symbol, started).await {
                Ok(snapshot) => {
                    debug!(
                        symbol = %symbol,
                        gap_pct = snapshot.gap_pct,
                        duration_ms = snapshot.fetch_duration_ms,
                        "fetched snapshot"
                    );
                    return Ok(snapshot);
                }
                Err(FetchAttemptError::InsufficientData(message)) => {
                    return Err(FetchError::new(
                        symbol,
                        FetchErrorKind::InsufficientData,
                        message,
                    ));
                }
                Err(FetchAttemptError::Provider(error)) => {
                    match self.retry.action_for(error.kind(), attempt) {
                        RetryAction::RetryAfter(delay) => {
                            warn!(
                                symbol = %symbol,
                                attempt,
                                delay_secs = delay.as_secs_f64(),
                                error = %error,
                                "fetch attempt failed, retrying"
                            );
                            if !self.shutdown.sleep(delay).await {
                                return Err(FetchError::new(
                                    symbol,
                                    FetchErrorKind::Transient,
                                    "shutdown requested during retry backoff",
                                ));
                            }
                            attempt += 1;
                        }
                        RetryAction::GiveUp => {
                            return Err(FetchError::new(
                                symbol,
                                error.kind().into(),
                                error.message().to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        symbol: &Symbol,
        started: Instant,
    ) -> Result<StockSnapshot, FetchAttemptError> {
        let quote = self.provider.quote_snapshot(symbol).await?;
        let bars = self.provider.daily_history(symbol, HISTORY_DAYS).await?;

        if bars.len() < 2 {
            return Err(FetchAttemptError::InsufficientData(format!(
                "got {} daily bars, need at least 2",
                bars.len()
            )));
        }

        let latest = bars[bars.len() - 1];
        let prev = bars[bars.len() - 2];

        let price = quote.price.unwrap_or(latest.close);
        if !price.is_finite() || price <= 0.0 {
            return Err(FetchAttemptError::InsufficientData(format!(
                "unusable price {price}"
            )));
        }

        let prev_close = prev.close;
        let gap_pct = gap_percent(price, prev_close);
        let volume = quote.volume.unwrap_or(latest.volume);
        let avg_volume = quote.avg_volume.unwrap_or(0);
        let rel_volume = relative_volume(volume, avg_volume);

        let sector = quote.sector.clone().unwrap_or_default();
        let industry = quote.industry.clone().unwrap_or_default();
        let category = categorize(&sector, &industry).to_string();

        let fetch_time = UtcDateTime::now();
        let now = fetch_time.into_inner();
        let market_state = self.resolve_market_state(quote.market_state.as_deref(), now);

        // Provider-supplied extended-hours prices win; the session heuristic
        // only fills in when the provider reported nothing.
        let (pre_price, pre_change, post_price, post_change) = if quote.has_pre_post_data {
            (
                quote.pre_market_price,
                quote.pre_market_change_pct,
                quote.post_market_price,
                quote.post_market_change_pct,
            )
        } else {
            match market_state {
                MarketSession::PreMarket => (Some(price), Some(gap_pct), None, None),
                MarketSession::AfterHours => (None, None, Some(price), Some(gap_pct)),
                _ => (None, None, None, None),
            }
        };

        Ok(StockSnapshot {
            symbol: symbol.clone(),
            price,
            prev_close,
            gap_pct,
            volume,
            volume_display: format_count(volume),
            avg_volume,
            rel_volume,
            market_cap: quote.market_cap,
            market_cap_display: format_dollars(quote.market_cap),
            float_shares: quote.float_shares,
            float_display: quote.float_shares.map(format_count).unwrap_or_else(|| "—".into()),
            pe_ratio: quote.pe_ratio,
            sector,
            industry,
            category,
            gap_classification: classify_gap(gap_pct).to_string(),
            pre_market_price: pre_price,
            pre_market_change_pct: pre_change,
            post_market_price: post_price,
            post_market_change_pct: post_change,
            market_state,
            data_fetch_time: fetch_time,
            fetch_duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// Map the provider's state label onto a session, falling back to the
    /// wall-clock classifier for absent or unrecognized labels.
    fn resolve_market_state(
        &self,
        provider_state: Option<&str>,
        now: OffsetDateTime,
    ) -> MarketSession {
        match provider_state {
            Some("PRE") | Some("PREPRE") => MarketSession::PreMarket,
            Some("REGULAR") => MarketSession::Regular,
            Some("POST") | Some("POSTPOST") => MarketSession::AfterHours,
            Some("CLOSED") => MarketSession::Closed,
            _ => classify(now, &self.clock),
        }
    }
}

enum FetchAttemptError {
    InsufficientData(String),
    Provider(ProviderError),
}

impl From<ProviderError> for FetchAttemptError {
    fn from(error: ProviderError) -> Self {
        Self::Provider(error)
    }
}
