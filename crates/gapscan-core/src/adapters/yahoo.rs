//! Yahoo Finance adapter.
//!
//! Supports two modes, selected by the transport: a real client drives the
//! unofficial quoteSummary/chart/screener endpoints with cookie+crumb
//! authentication, while the no-op transport switches the adapter into
//! deterministic fake mode so every offline test gets stable data.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Deserialize;

use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::{
    DailyBar, ProviderError, ProviderQuote, QuoteProvider, ScreenerList,
};
use crate::Symbol;

// ============================================================================
// Auth manager - cookie/crumb handling
// ============================================================================

/// Manages Yahoo Finance cookie/crumb authentication.
///
/// The unofficial API requires a session cookie from fc.yahoo.com and a
/// crumb token from query1.finance.yahoo.com/v1/test/getcrumb.
#[derive(Clone)]
pub struct YahooAuthManager {
    crumb: Arc<Mutex<Option<String>>>,
    last_refresh: Arc<Mutex<Option<Instant>>>,
    refreshing: Arc<AtomicBool>,
    auth_ttl_secs: u64,
}

impl Default for YahooAuthManager {
    fn default() -> Self {
        Self {
            crumb: Arc::new(Mutex::new(None)),
            last_refresh: Arc::new(Mutex::new(None)),
            refreshing: Arc::new(AtomicBool::new(false)),
            auth_ttl_secs: 3600,
        }
    }
}

impl YahooAuthManager {
    fn is_auth_valid(&self) -> bool {
        if self.crumb.lock().expect("crumb lock not poisoned").is_none() {
            return false;
        }
        self.last_refresh
            .lock()
            .expect("refresh lock not poisoned")
            .map(|last| last.elapsed().as_secs() < self.auth_ttl_secs)
            .unwrap_or(false)
    }

    /// Get the current crumb, refreshing cookie+crumb when expired.
    pub async fn get_crumb(
        &self,
        http_client: &Arc<dyn HttpClient>,
    ) -> Result<String, ProviderError> {
        if self.is_auth_valid() {
            if let Some(crumb) = self.crumb.lock().expect("crumb lock not poisoned").clone() {
                return Ok(crumb);
            }
        }

        self.refresh_auth(http_client).await?;

        self.crumb
            .lock()
            .expect("crumb lock not poisoned")
            .clone()
            .ok_or_else(|| ProviderError::transient("failed to obtain yahoo crumb"))
    }

    async fn refresh_auth(&self, http_client: &Arc<dyn HttpClient>) -> Result<(), ProviderError> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            // Another task is refreshing; give it a moment.
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            if self.is_auth_valid() {
                return Ok(());
            }
        }

        let result = self.do_refresh(http_client).await;
        self.refreshing.store(false, Ordering::SeqCst);
        result
    }

    async fn do_refresh(&self, http_client: &Arc<dyn HttpClient>) -> Result<(), ProviderError> {
        // Step 1: visit fc.yahoo.com to seed the session cookie jar.
        let cookie_request = HttpRequest::get("https://fc.yahoo.com")
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(10_000);

        let _ = http_client.execute(cookie_request).await.map_err(|e| {
            ProviderError::transient(format!("failed to fetch yahoo cookie: {}", e.message()))
        })?;

        // Step 2: fetch the crumb.
        let crumb_endpoints = [
            "https://query1.finance.yahoo.com/v1/test/getcrumb",
            "https://query2.finance.yahoo.com/v1/test/getcrumb",
        ];

        for endpoint in &crumb_endpoints {
            let request = HttpRequest::get(*endpoint)
                .with_header("referer", "https://finance.yahoo.com/")
                .with_timeout_ms(10_000);

            match http_client.execute(request).await {
                Ok(response) if response.is_success() && !response.body.is_empty() => {
                    let body = response.body.trim();

                    if body.contains("<html") || body.contains("<!DOCTYPE") {
                        continue;
                    }
                    if body.to_lowercase().contains("too many requests") {
                        return Err(ProviderError::rate_limited(
                            "yahoo rate limited while fetching crumb",
                        ));
                    }
                    if !body.is_empty() && body.len() < 100 && !body.contains(' ') {
                        *self.crumb.lock().expect("crumb lock not poisoned") =
                            Some(body.to_string());
                        *self.last_refresh.lock().expect("refresh lock not poisoned") =
                            Some(Instant::now());
                        return Ok(());
                    }
                }
                _ => continue,
            }
        }

        Err(ProviderError::transient(
            "failed to fetch yahoo crumb from all endpoints",
        ))
    }

    /// Invalidate cached auth (triggers refresh on next call).
    pub fn invalidate(&self) {
        *self.crumb.lock().expect("crumb lock not poisoned") = None;
        *self.last_refresh.lock().expect("refresh lock not poisoned") = None;
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Yahoo adapter supporting both real API calls and deterministic fake mode.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    auth_manager: Arc<YahooAuthManager>,
    use_real_api: bool,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            auth_manager: Arc::new(YahooAuthManager::default()),
            use_real_api: false,
        }
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            auth_manager: Arc::new(YahooAuthManager::default()),
            use_real_api,
        }
    }

    fn is_real_client(&self) -> bool {
        self.use_real_api
    }

    /// Execute a request; on 401/429 refresh auth once and retry with a
    /// fresh crumb appended to `base_url`.
    async fn execute_with_auth_retry(
        &self,
        build: impl Fn(&str) -> HttpRequest,
        base_url: &str,
    ) -> Result<String, ProviderError> {
        let crumb = self.auth_manager.get_crumb(&self.http_client).await?;
        let url = format!("{base_url}&crumb={}", urlencoding::encode(&crumb));

        let response = self
            .http_client
            .execute(build(&url))
            .await
            .map_err(classify_transport_error)?;

        let response = if response.status == 401 || response.status == 429 {
            self.auth_manager.invalidate();
            let crumb = self.auth_manager.get_crumb(&self.http_client).await?;
            let url = format!("{base_url}&crumb={}", urlencoding::encode(&crumb));

            self.http_client
                .execute(build(&url))
                .await
                .map_err(classify_transport_error)?
        } else {
            response
        };

        if response.is_rate_limited() {
            return Err(ProviderError::rate_limited(format!(
                "yahoo returned status {} after auth refresh",
                response.status
            )));
        }
        if !response.is_success() {
            let kind = if response.status >= 500 {
                ProviderError::transient
            } else {
                ProviderError::data
            };
            return Err(kind(format!("yahoo returned status {}", response.status)));
        }

        if response.body.to_lowercase().contains("too many requests") {
            return Err(ProviderError::rate_limited("yahoo body signaled throttling"));
        }

        Ok(response.body)
    }
}

fn classify_transport_error(error: crate::http_client::HttpError) -> ProviderError {
    if error.is_transient() {
        ProviderError::transient(format!("yahoo transport error: {}", error.message()))
    } else {
        ProviderError::data(format!("yahoo transport error: {}", error.message()))
    }
}

impl QuoteProvider for YahooAdapter {
    fn quote_snapshot<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderQuote, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            if self.is_real_client() {
                self.fetch_real_quote(symbol).await
            } else {
                Ok(fake_quote(symbol))
            }
        })
    }

    fn daily_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        days: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DailyBar>, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            if self.is_real_client() {
                self.fetch_real_history(symbol, days).await
            } else {
                Ok(fake_history(symbol, days))
            }
        })
    }

    fn screen<'a>(
        &'a self,
        list: ScreenerList,
        count: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            if self.is_real_client() {
                self.fetch_real_screen(list, count).await
            } else {
                Ok(fake_screen(list, count))
            }
        })
    }
}

// Real API implementation
impl YahooAdapter {
    async fn fetch_real_quote(&self, symbol: &Symbol) -> Result<ProviderQuote, ProviderError> {
        let modules = "price,summaryDetail,defaultKeyStatistics,assetProfile";
        let base_url = format!(
            "https://query1.finance.yahoo.com/v10/finance/quoteSummary/{}?modules={}",
            urlencoding::encode(symbol.as_str()),
            modules
        );

        let body = self
            .execute_with_auth_retry(
                |url| {
                    HttpRequest::get(url)
                        .with_header("referer", "https://finance.yahoo.com/")
                        .with_timeout_ms(10_000)
                },
                &base_url,
            )
            .await?;

        parse_quote_summary(&body)
    }

    async fn fetch_real_history(
        &self,
        symbol: &Symbol,
        days: u32,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let base_url = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{}?range=5d&interval=1d",
            urlencoding::encode(symbol.as_str())
        );

        let body = self
            .execute_with_auth_retry(
                |url| {
                    HttpRequest::get(url)
                        .with_header("referer", "https://finance.yahoo.com/")
                        .with_timeout_ms(10_000)
                },
                &base_url,
            )
            .await?;

        parse_chart_history(&body, days)
    }

    async fn fetch_real_screen(
        &self,
        list: ScreenerList,
        count: usize,
    ) -> Result<Vec<String>, ProviderError> {
        let body = match list {
            ScreenerList::PercentMovers { min_abs_pct } => {
                let base_url = format!(
                    "https://query1.finance.yahoo.com/v1/finance/screener?count={count}&sortField=percentchange"
                );
                let query = percent_movers_query(min_abs_pct);
                self.execute_with_auth_retry(
                    |url| {
                        HttpRequest::post(url)
                            .with_header("referer", "https://finance.yahoo.com/")
                            .with_header("content-type", "application/json")
                            .with_body(query.clone())
                            .with_timeout_ms(10_000)
                    },
                    &base_url,
                )
                .await?
            }
            predefined => {
                let base_url = format!(
                    "https://query1.finance.yahoo.com/v1/finance/screener/predefined/saved?scrIds={}&count={count}",
                    predefined.label()
                );
                self.execute_with_auth_retry(
                    |url| {
                        HttpRequest::get(url)
                            .with_header("referer", "https://finance.yahoo.com/")
                            .with_timeout_ms(10_000)
                    },
                    &base_url,
                )
                .await?
            }
        };

        parse_screen_response(&body)
    }
}

/// EquityQuery body for the custom percent-change screen: moves beyond
/// +/- `min_abs_pct`%, with loose price/volume floors so penny movers
/// are not filtered out.
fn percent_movers_query(min_abs_pct: u32) -> String {
    format!(
        r#"{{"quoteType":"EQUITY","query":{{"operator":"and","operands":[{{"operator":"or","operands":[{{"operator":"gt","operands":["percentchange",{min_abs_pct}]}},{{"operator":"lt","operands":["percentchange",-{min_abs_pct}]}}]}},{{"operator":"gte","operands":["intradayprice",0.1]}},{{"operator":"gt","operands":["dayvolume",500]}}]}}}}"#
    )
}

// ============================================================================
// Response parsing
// ============================================================================

/// Yahoo wraps numbers as `{"raw": 1.23, "fmt": "1.23"}` in some modules and
/// as plain numbers in others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YahooNum {
    Plain(f64),
    Wrapped { raw: Option<f64> },
}

impl YahooNum {
    fn to_option(&self) -> Option<f64> {
        match self {
            Self::Plain(v) => Some(*v),
            Self::Wrapped { raw } => *raw,
        }
    }
}

fn num(value: &Option<YahooNum>) -> Option<f64> {
    value.as_ref().and_then(YahooNum::to_option)
}

fn num_u64(value: &Option<YahooNum>) -> Option<u64> {
    num(value).filter(|v| *v >= 0.0).map(|v| v as u64)
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    #[serde(default)]
    result: Vec<QuoteSummaryResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
    #[serde(rename = "summaryDetail")]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(rename = "defaultKeyStatistics")]
    default_key_statistics: Option<KeyStatisticsModule>,
    #[serde(rename = "assetProfile")]
    asset_profile: Option<AssetProfileModule>,
}

#[derive(Debug, Deserialize)]
struct PriceModule {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<YahooNum>,
    #[serde(rename = "regularMarketVolume")]
    regular_market_volume: Option<YahooNum>,
    #[serde(rename = "marketCap")]
    market_cap: Option<YahooNum>,
    #[serde(rename = "marketState")]
    market_state: Option<String>,
    #[serde(rename = "preMarketPrice")]
    pre_market_price: Option<YahooNum>,
    #[serde(rename = "preMarketChangePercent")]
    pre_market_change_percent: Option<YahooNum>,
    #[serde(rename = "postMarketPrice")]
    post_market_price: Option<YahooNum>,
    #[serde(rename = "postMarketChangePercent")]
    post_market_change_percent: Option<YahooNum>,
}

#[derive(Debug, Deserialize)]
struct SummaryDetailModule {
    #[serde(rename = "averageVolume")]
    average_volume: Option<YahooNum>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<YahooNum>,
}

#[derive(Debug, Deserialize)]
struct KeyStatisticsModule {
    #[serde(rename = "floatShares")]
    float_shares: Option<YahooNum>,
    #[serde(rename = "sharesOutstanding")]
    shares_outstanding: Option<YahooNum>,
}

#[derive(Debug, Deserialize)]
struct AssetProfileModule {
    sector: Option<String>,
    industry: Option<String>,
}

fn parse_quote_summary(body: &str) -> Result<ProviderQuote, ProviderError> {
    let response: QuoteSummaryResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::data(format!("failed to parse yahoo quoteSummary: {e}")))?;

    if let Some(error) = &response.quote_summary.error {
        if !error.is_null() {
            return Err(ProviderError::data(format!("yahoo API error: {error}")));
        }
    }

    let result = response
        .quote_summary
        .result
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::data("empty quoteSummary result"))?;

    let price = result.price.as_ref();
    let detail = result.summary_detail.as_ref();
    let stats = result.default_key_statistics.as_ref();
    let profile = result.asset_profile.as_ref();

    let pre_market_price = price.and_then(|p| num(&p.pre_market_price));
    let post_market_price = price.and_then(|p| num(&p.post_market_price));

    Ok(ProviderQuote {
        price: price.and_then(|p| num(&p.regular_market_price)),
        volume: price.and_then(|p| num_u64(&p.regular_market_volume)),
        avg_volume: detail.and_then(|d| num_u64(&d.average_volume)),
        market_cap: price.and_then(|p| num(&p.market_cap)),
        float_shares: stats
            .and_then(|s| num_u64(&s.float_shares))
            .or_else(|| stats.and_then(|s| num_u64(&s.shares_outstanding))),
        pe_ratio: detail.and_then(|d| num(&d.trailing_pe)),
        sector: profile.and_then(|p| p.sector.clone()),
        industry: profile.and_then(|p| p.industry.clone()),
        market_state: price.and_then(|p| p.market_state.clone()),
        has_pre_post_data: pre_market_price.is_some() || post_market_price.is_some(),
        pre_market_price,
        pre_market_change_pct: price.and_then(|p| num(&p.pre_market_change_percent)),
        post_market_price,
        post_market_change_pct: price.and_then(|p| num(&p.post_market_change_percent)),
    })
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Vec<ChartResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

fn parse_chart_history(body: &str, days: u32) -> Result<Vec<DailyBar>, ProviderError> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::data(format!("failed to parse yahoo chart: {e}")))?;

    if let Some(error) = &response.chart.error {
        if !error.is_null() {
            return Err(ProviderError::data(format!("yahoo chart API error: {error}")));
        }
    }

    let result = response
        .chart
        .result
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::data("no chart data in response"))?;

    let len = result.timestamp.as_ref().map(Vec::len).unwrap_or(0);
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::data("no quote data in chart response"))?;

    let mut bars = Vec::new();
    for i in 0..len {
        if let Some(Some(close)) = quote.close.get(i) {
            let volume = quote
                .volume
                .get(i)
                .copied()
                .flatten()
                .filter(|v| *v >= 0)
                .map(|v| v as u64)
                .unwrap_or(0);
            bars.push(DailyBar {
                close: *close,
                volume,
            });
        }
    }

    // Most recent `days` bars, oldest first.
    let keep = days as usize;
    if bars.len() > keep {
        bars.drain(..bars.len() - keep);
    }
    Ok(bars)
}

#[derive(Debug, Deserialize)]
struct ScreenResponse {
    finance: ScreenFinance,
}

#[derive(Debug, Deserialize)]
struct ScreenFinance {
    #[serde(default)]
    result: Vec<ScreenResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ScreenResult {
    #[serde(default)]
    quotes: Vec<ScreenQuote>,
}

#[derive(Debug, Deserialize)]
struct ScreenQuote {
    symbol: String,
}

fn parse_screen_response(body: &str) -> Result<Vec<String>, ProviderError> {
    let response: ScreenResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::data(format!("failed to parse yahoo screener: {e}")))?;

    if let Some(error) = &response.finance.error {
        if !error.is_null() {
            return Err(ProviderError::data(format!(
                "yahoo screener API error: {error}"
            )));
        }
    }

    Ok(response
        .finance
        .result
        .into_iter()
        .flat_map(|r| r.quotes)
        .map(|q| q.symbol)
        .collect())
}

// ============================================================================
// Deterministic fake mode
// ============================================================================

/// Stable per-symbol seed so fake prices are deterministic across runs.
fn symbol_seed(symbol: &str) -> u64 {
    symbol
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}

fn fake_quote(symbol: &Symbol) -> ProviderQuote {
    let seed = symbol_seed(symbol.as_str());
    let price = 20.0 + (seed % 400) as f64 / 2.0;
    let volume = 1_000_000 + seed % 9_000_000;
    let avg_volume = 2_000_000 + seed % 3_000_000;

    let sectors: &[(&str, &str)] = &[
        ("Technology", "Semiconductors"),
        ("Healthcare", "Biotechnology"),
        ("Technology", "Software - Application"),
        ("Financial Services", "Banks - Regional"),
        ("Energy", "Oil & Gas E&P"),
    ];
    let (sector, industry) = sectors[(seed % sectors.len() as u64) as usize];

    ProviderQuote {
        price: Some(price),
        volume: Some(volume),
        avg_volume: Some(avg_volume),
        market_cap: Some(price * 1e8),
        float_shares: Some(50_000_000 + seed % 500_000_000),
        pe_ratio: Some(12.0 + (seed % 40) as f64),
        sector: Some(sector.to_string()),
        industry: Some(industry.to_string()),
        market_state: Some(String::from("REGULAR")),
        has_pre_post_data: false,
        pre_market_price: None,
        pre_market_change_pct: None,
        post_market_price: None,
        post_market_change_pct: None,
    }
}

/// Fake history: symbols starting with "BAD" get a single bar so tests can
/// exercise the insufficient-history path.
fn fake_history(symbol: &Symbol, days: u32) -> Vec<DailyBar> {
    let seed = symbol_seed(symbol.as_str());
    let price = 20.0 + (seed % 400) as f64 / 2.0;

    if symbol.as_str().starts_with("BAD") {
        return vec![DailyBar {
            close: price,
            volume: 1_000,
        }];
    }

    (0..days)
        .map(|i| DailyBar {
            // Yesterday trades ~3% below today, giving every fake symbol a gap.
            close: price * (1.0 - 0.03 * (days - 1 - i) as f64),
            volume: 1_000_000 + seed % 9_000_000,
        })
        .collect()
}

fn fake_screen(list: ScreenerList, count: usize) -> Vec<String> {
    let pools: HashMap<&str, &[&str]> = [
        (
            "day_gainers",
            &["NVDA", "SMCI", "IONQ", "UP", "BRK.B"] as &[&str],
        ),
        ("day_losers", &["LCID", "RIVN", "PLUG", "SHIP"]),
        ("most_actives", &["TSLA", "AAPL", "SOFI", "MARA"]),
        ("small_cap_gainers", &["TNXP", "OCGN", "GNUS", "1234"]),
        ("aggressive_small_caps", &["KOSS", "CLOV", "STEM"]),
        ("percent_movers", &["SAVA", "IXHL", "SHIBUSD", "RY.TO"]),
    ]
    .into_iter()
    .collect();

    pools
        .get(list.label())
        .copied()
        .unwrap_or_default()
        .iter()
        .take(count)
        .map(|s| (*s).to_string())
        .collect()
}
