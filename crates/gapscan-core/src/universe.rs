//! Scan universe construction: priority symbols, a curated volatile set, and
//! provider screeners, merged in that order with validity filtering and an
//! insertion-order dedup.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::provider::{QuoteProvider, ScreenerList};
use crate::Symbol;

/// Symbols that must be present in every scan. The scan is considered
/// incomplete until each of these has a cache entry.
pub const PRIORITY_SYMBOLS: &[&str] = &[
    "IXHL", "TSLA", "NVDA", "AMD", "GME", "AMC", "META", "GOOGL", "MSFT", "AAPL", "AMZN",
];

/// Curated high-beta names worth watching even when no screener surfaces them.
pub const VOLATILE_SYMBOLS: &[&str] = &[
    "SMCI", "IONQ", "SOFI", "MARA", "RIOT", "COIN", "PLTR", "HOOD", "SAVA", "TNXP", "OCGN",
    "LCID", "RIVN", "PLUG", "CLOV",
];

/// Symbols excluded regardless of source: delisted names, known junk, and
/// crypto pairs that leak through the equity screeners.
pub const EXCLUDED_SYMBOLS: &[&str] = &[
    "WISH", "NKLA", "BBBY", "EXPR", "CEI", "MULN", "ATER", "BKKT", "SDC", "RDBX", "SHIBUSD",
    "DOGEUSD", "BTCUSD", "ETHUSD",
];

/// Foreign-exchange listing suffixes; anything carrying one is off-universe.
const FOREIGN_SUFFIXES: &[&str] = &[
    ".AQ", ".NX", ".L", ".BR", ".TW", ".TO", ".V", ".F", ".DE",
];

/// How many candidates to request from each screener before filtering.
const SCREENER_FETCH_COUNT: usize = 25;

/// Validity gate applied to every candidate regardless of source.
pub fn is_valid_symbol(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }

    let upper = trimmed.to_ascii_uppercase();
    if EXCLUDED_SYMBOLS.contains(&upper.as_str()) {
        return false;
    }
    if FOREIGN_SUFFIXES.iter().any(|s| upper.ends_with(s)) {
        return false;
    }

    Symbol::parse(&upper).is_ok()
}

/// Builds the per-scan symbol universe.
pub struct UniverseBuilder {
    provider: Arc<dyn QuoteProvider>,
    max_symbols: usize,
}

impl UniverseBuilder {
    pub fn new(provider: Arc<dyn QuoteProvider>, max_symbols: usize) -> Self {
        Self {
            provider,
            max_symbols,
        }
    }

    /// Screeners queried each scan, broadest-signal first.
    fn screener_lists() -> [ScreenerList; 7] {
        [
            ScreenerList::DayGainers,
            ScreenerList::SmallCapGainers,
            ScreenerList::MostActives,
            ScreenerList::DayLosers,
            ScreenerList::AggressiveSmallCaps,
            ScreenerList::PercentMovers { min_abs_pct: 15 },
            ScreenerList::PercentMovers { min_abs_pct: 10 },
        ]
    }

    /// Assemble the universe: priority, then volatile, then screener output,
    /// deduplicated in insertion order and capped at `max_symbols`.
    ///
    /// A failing screener is logged and skipped; the priority and volatile
    /// sets guarantee the scan never runs on an empty universe.
    pub async fn build(&self) -> Vec<Symbol> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut universe: Vec<Symbol> = Vec::new();

        let mut push = |raw: &str, seen: &mut HashSet<String>, universe: &mut Vec<Symbol>| {
            if !is_valid_symbol(raw) {
                return;
            }
            if let Ok(symbol) = Symbol::parse(raw) {
                if seen.insert(symbol.as_str().to_string()) {
                    universe.push(symbol);
                }
            }
        };

        for raw in PRIORITY_SYMBOLS {
            push(raw, &mut seen, &mut universe);
        }
        for raw in VOLATILE_SYMBOLS {
            push(raw, &mut seen, &mut universe);
        }

        for list in Self::screener_lists() {
            match self.provider.screen(list, SCREENER_FETCH_COUNT).await {
                Ok(candidates) => {
                    let before = universe.len();
                    for raw in &candidates {
                        push(raw, &mut seen, &mut universe);
                    }
                    debug!(
                        screener = %list,
                        candidates = candidates.len(),
                        accepted = universe.len() - before,
                        "screener merged"
                    );
                }
                Err(error) => {
                    warn!(screener = %list, error = %error, "screener failed, skipping");
                }
            }

            if universe.len() >= self.max_symbols {
                break;
            }
        }

        universe.truncate(self.max_symbols);
        universe
    }
}
