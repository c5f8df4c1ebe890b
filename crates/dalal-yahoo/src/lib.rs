#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Yahoo Finance upstream adapter.
//!
//! This crate provides a Yahoo Finance provider that implements the
//! [`DataProvider`], [`SnapshotProvider`], and [`HistoryProvider`] traits
//! from `dalal-core`.
//!
//! # Features
//!
//! - Lightweight snapshot from the v7 quote API, renamed to the
//!   lightweight field names the normalizer reads
//! - Full snapshot from the quote summary API, flattened to plain values
//! - Daily close history from the chart API
//! - Built-in rate limiting (1 request per second by default)
//!
//! # Example
//!
//! ```no_run
//! use dalal_yahoo::YahooProvider;
//! use dalal_core::{HistoryPeriod, HistoryProvider, Symbol};
//!
//! # async fn example() -> dalal_core::Result<()> {
//! let provider = YahooProvider::new();
//! let series = provider
//!     .fetch_history(&Symbol::new("RELIANCE.NS"), HistoryPeriod::SixMonths)
//!     .await?;
//! println!("Fetched {} closes", series.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use dalal_core::{
    DataError, DataProvider, HistoryPeriod, HistoryProvider, PricePoint, RawFields, Result,
    Series, SnapshotProvider, Symbol,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

/// Yahoo Finance chart API base URL.
const CHART_API_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance quote API base URL.
const QUOTE_API_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";

/// Yahoo Finance quote summary API base URL.
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Modules requested for the full snapshot.
const SUMMARY_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData";

/// Default rate limit delay in milliseconds.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

const PROVIDER_NAME: &str = "Yahoo Finance";

/// Quote API field -> lightweight field name.
const FAST_FIELDS: &[(&str, &str)] = &[
    ("regularMarketPrice", "lastPrice"),
    ("regularMarketPreviousClose", "lastClose"),
    ("regularMarketPreviousClose", "previousClose"),
    ("regularMarketOpen", "open"),
    ("regularMarketChangePercent", "changePercent"),
    ("fiftyTwoWeekHigh", "yearHigh"),
    ("fiftyTwoWeekLow", "yearLow"),
    ("marketCap", "marketCap"),
    ("trailingPE", "trailingPE"),
    ("shortName", "shortName"),
];

/// Yahoo Finance data provider.
///
/// Implements [`DataProvider`], [`SnapshotProvider`], and [`HistoryProvider`].
#[derive(Debug)]
pub struct YahooProvider {
    client: reqwest::Client,
    rate_limit: Duration,
    next_slot: Mutex<Instant>,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider with default settings.
    ///
    /// Uses built-in rate limiting of 1 request per second.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limit(Duration::from_millis(DEFAULT_RATE_LIMIT_MS))
    }

    fn build(client: reqwest::Client, rate_limit: Duration) -> Self {
        Self {
            client,
            rate_limit,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Create a new Yahoo Finance provider with a custom HTTP client.
    ///
    /// Uses the provided client for all HTTP requests. Rate limiting
    /// is still applied.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self::build(client, Duration::from_millis(DEFAULT_RATE_LIMIT_MS))
    }

    /// Create a new Yahoo Finance provider with custom rate limiting.
    #[must_use]
    pub fn with_rate_limit(rate_limit: Duration) -> Self {
        let client = match reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Failed to configure HTTP client, using reqwest defaults");
                reqwest::Client::new()
            }
        };

        Self::build(client, rate_limit)
    }

    /// Waits for this request's slot.
    ///
    /// Each caller reserves the next free slot under the lock and then
    /// sleeps outside it, so concurrent requests are spaced `rate_limit`
    /// apart.
    async fn apply_rate_limit(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let slot = (*next_slot).max(Instant::now());
            *next_slot = slot + self.rate_limit;
            slot
        };

        if slot > Instant::now() {
            debug!("Rate limiting: waiting {:?}", slot - Instant::now());
            sleep_until(slot).await;
        }
    }

    /// Rate-limited GET that maps HTTP failures onto [`DataError`].
    async fn get_json<T: DeserializeOwned>(&self, symbol: &Symbol, url: &str) -> Result<T> {
        self.apply_rate_limit().await;
        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }

        // The quote endpoint sometimes demands a session cookie we don't carry.
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::NotSupported(format!(
                "{PROVIDER_NAME} requires authentication for {url}"
            )));
        }

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }

        if !response.status().is_success() {
            return Err(DataError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                symbol
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))
    }

    /// Build the chart API URL for a symbol and period.
    fn build_chart_url(symbol: &Symbol, period: HistoryPeriod) -> String {
        format!(
            "{}/{}?range={}&interval=1d",
            CHART_API_URL,
            symbol.as_str(),
            period.as_range()
        )
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "Yahoo Finance quotes and daily history"
    }
}

#[async_trait]
impl SnapshotProvider for YahooProvider {
    async fn fetch_fast_info(&self, symbol: &Symbol) -> Result<RawFields> {
        let url = format!("{}?symbols={}", QUOTE_API_URL, symbol.as_str());
        let response: QuoteResponse = self.get_json(symbol, &url).await?;
        parse_quote_response(symbol, response)
    }

    async fn fetch_info(&self, symbol: &Symbol) -> Result<RawFields> {
        let url = format!(
            "{}/{}?modules={}",
            QUOTE_SUMMARY_URL,
            symbol.as_str(),
            SUMMARY_MODULES
        );
        let response: QuoteSummaryResponse = self.get_json(symbol, &url).await?;
        parse_summary_response(symbol, response)
    }
}

#[async_trait]
impl HistoryProvider for YahooProvider {
    async fn fetch_history(&self, symbol: &Symbol, period: HistoryPeriod) -> Result<Series> {
        let url = Self::build_chart_url(symbol, period);
        let response: ChartResponse = self.get_json(symbol, &url).await?;
        parse_chart_response(symbol, response)
    }
}

/// Picks the symbol's quote and renames its fields to the lightweight names.
fn parse_quote_response(symbol: &Symbol, response: QuoteResponse) -> Result<RawFields> {
    if let Some(error) = response.quote_response.error {
        return Err(DataError::Other(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let quote = response
        .quote_response
        .result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))?;

    // May come back empty; the caller then falls back to the full quote.
    Ok(FAST_FIELDS
        .iter()
        .filter_map(|(from, to)| {
            let value = quote.get(*from)?;
            (!value.is_null()).then(|| ((*to).to_string(), value.clone()))
        })
        .collect())
}

/// Merges the summary modules into one flat map of plain values.
///
/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`; only `raw` is kept.
/// Modules are read in request order and the first to define a field wins.
fn parse_summary_response(symbol: &Symbol, response: QuoteSummaryResponse) -> Result<RawFields> {
    if let Some(error) = response.quote_summary.error {
        if error.code == "Not Found" {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }
        return Err(DataError::Other(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let modules = response
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))?;

    let mut fields = RawFields::new();
    for name in SUMMARY_MODULES.split(',') {
        let Some(Value::Object(module)) = modules.get(name) else {
            continue;
        };
        for (key, value) in module {
            let value = match value {
                Value::Object(wrapped) => match wrapped.get("raw") {
                    Some(raw) => raw.clone(),
                    None => continue,
                },
                Value::Null => continue,
                other => other.clone(),
            };
            fields.entry(key.clone()).or_insert(value);
        }
    }

    if fields.is_empty() {
        return Err(DataError::DataNotAvailable {
            symbol: symbol.to_string(),
            reason: "quote summary was empty".to_string(),
        });
    }
    Ok(fields)
}

/// Turns a chart response into daily closes, skipping days without a close.
fn parse_chart_response(symbol: &Symbol, response: ChartResponse) -> Result<Series> {
    if let Some(error) = response.chart.error {
        if error.code == "Not Found" {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }
        return Err(DataError::Other(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let points = timestamps
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let date = Utc.timestamp_opt(ts, 0).single()?.date_naive();
            Some(PricePoint::new(date, close?))
        })
        .collect();

    Ok(Series::from_points(points))
}

// ============================================================================
// Yahoo Finance API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

/// Quote API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    quote_response: QuoteResult,
}

#[derive(Debug, Deserialize)]
struct QuoteResult {
    #[serde(default)]
    result: Vec<RawFields>,
    error: Option<ApiError>,
}

/// Quote Summary API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<RawFields>>,
    error: Option<ApiError>,
}

/// Chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
