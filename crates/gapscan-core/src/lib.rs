//! # Gapscan Core
//!
//! Core contracts and domain types for the gapscan background stock scanner.
//!
//! ## Overview
//!
//! This crate provides the foundational components for gapscan:
//!
//! - **Validated domain models** for symbols, timestamps, and stock snapshots
//! - **Market session classification** for the US equity trading day
//! - **Provider trait** with a Yahoo Finance adapter (real and fake modes)
//! - **Per-symbol fetch pipeline** with retry and error classification
//! - **Universe builder** merging priority, volatile, and screener symbols
//! - **Request pacing** with deterministic delays and a hard rate budget
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Yahoo Finance) |
//! | [`domain`] | Domain models (Symbol, UtcDateTime, StockSnapshot) |
//! | [`error`] | Core error types |
//! | [`fetcher`] | Per-symbol fetch pipeline with retry |
//! | [`http_client`] | HTTP client abstraction |
//! | [`pacing`] | Inter-request pacing and rate budget |
//! | [`provider`] | Provider contract and error normalization |
//! | [`retry`] | Retry backoff policy |
//! | [`session`] | Market session classification |
//! | [`shutdown`] | Cooperative shutdown signal |
//! | [`universe`] | Scan universe construction |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gapscan_core::{Fetcher, RetryConfig, Shutdown, Symbol, YahooAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(YahooAdapter::default());
//!     let fetcher = Fetcher::new(provider, RetryConfig::default(), Shutdown::new());
//!
//!     let symbol = Symbol::parse("AAPL")?;
//!     let snapshot = fetcher.fetch(&symbol).await?;
//!     println!("{} gap: {:.2}%", snapshot.symbol, snapshot.gap_pct);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Upstream failures are normalized into [`provider::ProviderErrorKind`] at
//! the adapter boundary; retry policy downstream is a pure function of that
//! kind and the attempt number, never of error-message text.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod pacing;
pub mod provider;
pub mod retry;
pub mod session;
pub mod shutdown;
pub mod universe;

// Re-export commonly used types at crate root for convenience

// Adapter implementations
pub use adapters::{YahooAdapter, YahooAuthManager};

// Domain models
pub use domain::{StockSnapshot, Symbol, UtcDateTime};

// Error types
pub use error::ValidationError;

// Fetch pipeline
pub use fetcher::{FetchError, FetchErrorKind, Fetcher};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};

// Pacing
pub use pacing::{Pacer, PacingConfig};

// Provider contract
pub use provider::{
    DailyBar, ProviderError, ProviderErrorKind, ProviderQuote, QuoteProvider, ScreenerList,
};

// Retry logic
pub use retry::{Backoff, RetryAction, RetryConfig};

// Session classification
pub use session::{classify, ExchangeClock, MarketSession, SessionMeta};

// Shutdown signal
pub use shutdown::Shutdown;

// Universe construction
pub use universe::{is_valid_symbol, UniverseBuilder, PRIORITY_SYMBOLS};
