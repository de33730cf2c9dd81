//! Provider contract and error normalization.
//!
//! All upstream failure modes are normalized into [`ProviderErrorKind`] at
//! this boundary, so retry policy downstream is a pure function of the kind
//! and the attempt number — never of error-message text.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::Symbol;

/// Raw normalized quote payload as reported by the provider, before the
/// fetcher derives gap/volume metrics. Optional fields stay optional here;
/// the fetcher decides what is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderQuote {
    pub price: Option<f64>,
    pub volume: Option<u64>,
    pub avg_volume: Option<u64>,
    pub market_cap: Option<f64>,
    pub float_shares: Option<u64>,
    pub pe_ratio: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    /// Provider-reported market state label (e.g. "PRE", "REGULAR", "POST").
    pub market_state: Option<String>,
    pub has_pre_post_data: bool,
    pub pre_market_price: Option<f64>,
    pub pre_market_change_pct: Option<f64>,
    pub post_market_price: Option<f64>,
    pub post_market_change_pct: Option<f64>,
}

/// One daily bar of the short history used for gap calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyBar {
    pub close: f64,
    pub volume: u64,
}

/// Predefined screener lists offered by the provider, plus a custom
/// percent-change query for catching extreme movers the canned lists miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenerList {
    DayGainers,
    DayLosers,
    MostActives,
    SmallCapGainers,
    AggressiveSmallCaps,
    /// Symbols moving more than the given percent in either direction.
    PercentMovers { min_abs_pct: u32 },
}

impl ScreenerList {
    pub const fn label(self) -> &'static str {
        match self {
            Self::DayGainers => "day_gainers",
            Self::DayLosers => "day_losers",
            Self::MostActives => "most_actives",
            Self::SmallCapGainers => "small_cap_gainers",
            Self::AggressiveSmallCaps => "aggressive_small_caps",
            Self::PercentMovers { .. } => "percent_movers",
        }
    }
}

impl Display for ScreenerList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized upstream error kind. Retry policy keys off this alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Provider signaled throttling (429 or an explicit rate-limit body).
    RateLimited,
    /// Timeout or connection failure; retry with standard backoff.
    Transient,
    /// Malformed or unexpected payload; retrying will not help.
    Data,
}

/// Upstream error carrying its normalized kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
}

impl ProviderError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Data,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::RateLimited | ProviderErrorKind::Transient
        )
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind_str(), self.message)
    }
}

impl ProviderError {
    const fn kind_str(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::Transient => "transient",
            ProviderErrorKind::Data => "data",
        }
    }
}

impl std::error::Error for ProviderError {}

/// Market-data provider contract consumed by the fetcher and the universe
/// builder. Implementations must be side-effect free on error: a failed
/// call leaves no partial state behind.
pub trait QuoteProvider: Send + Sync {
    /// Fetch the raw quote payload for one symbol.
    fn quote_snapshot<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderQuote, ProviderError>> + Send + 'a>>;

    /// Fetch the most recent `days` daily bars, oldest first.
    fn daily_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        days: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DailyBar>, ProviderError>> + Send + 'a>>;

    /// Run a screener and return candidate symbol strings (unvalidated;
    /// the universe builder filters them).
    fn screen<'a>(
        &'a self,
        list: ScreenerList,
        count: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, ProviderError>> + Send + 'a>>;
}
