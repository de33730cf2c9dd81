//! Behavior-driven tests for the per-symbol fetch pipeline
//!
//! These tests verify HOW a fetch turns provider payloads into snapshots:
//! derived metrics, guard behavior on degenerate inputs, retry policy, and
//! the universe gate that decides what gets fetched at all.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use gapscan_core::domain::{gap_percent, relative_volume};
use gapscan_core::fetcher::{FetchErrorKind, Fetcher};
use gapscan_core::provider::{
    DailyBar, ProviderError, ProviderErrorKind, ProviderQuote, QuoteProvider, ScreenerList,
};
use gapscan_core::retry::{Backoff, RetryAction, RetryConfig};
use gapscan_core::universe::is_valid_symbol;
use gapscan_core::{MarketSession, Shutdown, Symbol};
use gapscan_tests::fake_adapter;

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        backoff: Backoff::Fixed {
            delay: Duration::from_millis(1),
        },
        rate_limit_penalty: Duration::from_millis(1),
    }
}

// =============================================================================
// Degenerate provider payloads
// =============================================================================

struct FixedProvider {
    quote: ProviderQuote,
    bars: Vec<DailyBar>,
}

impl QuoteProvider for FixedProvider {
    fn quote_snapshot<'a>(
        &'a self,
        _symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderQuote, ProviderError>> + Send + 'a>> {
        let quote = self.quote.clone();
        Box::pin(async move { Ok(quote) })
    }

    fn daily_history<'a>(
        &'a self,
        _symbol: &'a Symbol,
        _days: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DailyBar>, ProviderError>> + Send + 'a>> {
        let bars = self.bars.clone();
        Box::pin(async move { Ok(bars) })
    }

    fn screen<'a>(
        &'a self,
        _list: ScreenerList,
        _count: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, ProviderError>> + Send + 'a>> {
        Box::pin(async move { Ok(Vec::new()) })
    }
}

#[tokio::test]
async fn when_previous_close_is_zero_gap_is_zero_not_infinite() {
    // Given: A history whose previous close is zero
    let provider = Arc::new(FixedProvider {
        quote: ProviderQuote {
            price: Some(150.0),
            volume: Some(1_000_000),
            ..ProviderQuote::default()
        },
        bars: vec![
            DailyBar {
                close: 0.0,
                volume: 0,
            },
            DailyBar {
                close: 150.0,
                volume: 1_000_000,
            },
        ],
    });
    let fetcher = Fetcher::new(provider, fast_retry(), Shutdown::new());

    // When: The symbol is fetched
    let snapshot = fetcher
        .fetch(&Symbol::parse("AAPL").expect("valid"))
        .await
        .expect("fetch succeeds");

    // Then: The gap is exactly zero, never NaN or infinite
    assert_eq!(snapshot.gap_pct, 0.0);
    assert!(snapshot.gap_pct.is_finite());
}

#[tokio::test]
async fn when_average_volume_is_missing_relative_volume_is_zero() {
    // Given: A quote with no average volume
    let provider = Arc::new(FixedProvider {
        quote: ProviderQuote {
            price: Some(150.0),
            volume: Some(3_000_000),
            avg_volume: None,
            ..ProviderQuote::default()
        },
        bars: vec![
            DailyBar {
                close: 145.0,
                volume: 2_000_000,
            },
            DailyBar {
                close: 150.0,
                volume: 3_000_000,
            },
        ],
    });
    let fetcher = Fetcher::new(provider, fast_retry(), Shutdown::new());

    // When: The symbol is fetched
    let snapshot = fetcher
        .fetch(&Symbol::parse("AAPL").expect("valid"))
        .await
        .expect("fetch succeeds");

    // Then: Relative volume degrades to zero
    assert_eq!(snapshot.rel_volume, 0.0);
    // And the gap is the canonical 2-decimal value
    assert_eq!(snapshot.gap_pct, 3.45);
}

#[tokio::test]
async fn when_provider_reports_premarket_prices_they_take_precedence() {
    // Given: A quote carrying explicit pre-market data
    let provider = Arc::new(FixedProvider {
        quote: ProviderQuote {
            price: Some(150.0),
            volume: Some(1_000_000),
            market_state: Some(String::from("PRE")),
            has_pre_post_data: true,
            pre_market_price: Some(153.2),
            pre_market_change_pct: Some(2.13),
            ..ProviderQuote::default()
        },
        bars: vec![
            DailyBar {
                close: 145.0,
                volume: 2_000_000,
            },
            DailyBar {
                close: 150.0,
                volume: 3_000_000,
            },
        ],
    });
    let fetcher = Fetcher::new(provider, fast_retry(), Shutdown::new());

    // When: The symbol is fetched
    let snapshot = fetcher
        .fetch(&Symbol::parse("AAPL").expect("valid"))
        .await
        .expect("fetch succeeds");

    // Then: The provider's extended-hours values win over any heuristic
    assert_eq!(snapshot.market_state, MarketSession::PreMarket);
    assert_eq!(snapshot.pre_market_price, Some(153.2));
    assert_eq!(snapshot.pre_market_change_pct, Some(2.13));
    assert_eq!(snapshot.post_market_price, None);
}

// =============================================================================
// Retry policy
// =============================================================================

#[test]
fn retry_delays_follow_the_documented_schedule() {
    // Given: The production retry profile (base 5s, 3 retries)
    let config = RetryConfig::exponential(Duration::from_secs(5), 3);

    // When/Then: Transient failures wait 5, 10, 20 seconds, then give up
    let delays: Vec<RetryAction> = (0..4)
        .map(|attempt| config.action_for(ProviderErrorKind::Transient, attempt))
        .collect();
    assert_eq!(
        delays,
        vec![
            RetryAction::RetryAfter(Duration::from_secs(5)),
            RetryAction::RetryAfter(Duration::from_secs(10)),
            RetryAction::RetryAfter(Duration::from_secs(20)),
            RetryAction::GiveUp,
        ]
    );

    // And: Rate-limited failures carry the flat penalty on top
    assert_eq!(
        config.action_for(ProviderErrorKind::RateLimited, 0),
        RetryAction::RetryAfter(Duration::from_secs(10))
    );

    // And: Data failures never retry
    assert_eq!(
        config.action_for(ProviderErrorKind::Data, 0),
        RetryAction::GiveUp
    );
}

#[tokio::test]
async fn when_history_is_short_the_failure_is_terminal_not_retried() {
    // Given: The offline adapter, where BAD-prefixed symbols lack history
    let fetcher = Fetcher::new(fake_adapter(), fast_retry(), Shutdown::new());

    // When: Such a symbol is fetched
    let error = fetcher
        .fetch(&Symbol::parse("BADSY").expect("valid"))
        .await
        .expect_err("must fail");

    // Then: The error is classified as insufficient data
    assert_eq!(error.kind(), FetchErrorKind::InsufficientData);
    assert_eq!(error.symbol().as_str(), "BADSY");
}

// =============================================================================
// Derived metric helpers agree with the pipeline
// =============================================================================

#[test]
fn gap_and_volume_helpers_round_to_two_decimals() {
    assert_eq!(gap_percent(150.0, 145.0), 3.45);
    assert_eq!(gap_percent(100.0, 0.0), 0.0);
    assert_eq!(relative_volume(3_000_000, 2_000_000), 1.5);
    assert_eq!(relative_volume(1, 0), 0.0);
}

// =============================================================================
// Universe validity gate
// =============================================================================

#[test]
fn validity_gate_matches_the_symbol_contract() {
    // Plain 1-5 letter tickers pass
    assert!(is_valid_symbol("AAPL"));
    assert!(is_valid_symbol("F"));
    assert!(is_valid_symbol("GOOGL"));

    // Dots, digits, length overruns, crypto pairs, and exclusions fail
    assert!(!is_valid_symbol("BRK.B"));
    assert!(!is_valid_symbol("1234"));
    assert!(!is_valid_symbol("TOOLONG1"));
    assert!(!is_valid_symbol("SHIBUSD"));
    assert!(!is_valid_symbol("RY.TO"));
    assert!(!is_valid_symbol("WISH"));
}
