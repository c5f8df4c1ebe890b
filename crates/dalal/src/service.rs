//! Query layer over the cache, fetcher and normalizer.

use std::sync::Arc;

use dalal_cache::QuoteCache;
use dalal_core::{DataProvider, MarketDataProvider, Result, Series, Snapshot, Symbol};
use futures::stream::{self, StreamExt};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::fetcher::{BackoffFetcher, FetchOutcome};
use crate::normalize::{apply_series_fallback, normalize};

/// Most snapshots a query returns.
pub const PAGE_SIZE: usize = 20;

/// What a search term is matched against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchScope {
    /// Symbol or display name. Names are only known after fetching, so
    /// every symbol is fetched.
    #[default]
    SymbolOrName,
    /// Symbol only. Non-matching symbols are dropped before fetching.
    Symbol,
}

/// Filtering options for [`MarketData::query_with`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Case-insensitive substring to keep; blank means no filter.
    pub search: Option<String>,
    /// Fields the search term is matched against.
    pub scope: SearchScope,
}

impl QueryOptions {
    /// Options with no filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only snapshots matching `term`.
    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Sets what the search term is matched against.
    #[must_use]
    pub const fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    fn term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Everything a detail page shows for one symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct Detail {
    /// Snapshot, with its price filled from `series` if the quote had none.
    pub snapshot: Snapshot,
    /// Daily closes, or `None` if history could not be fetched.
    pub series: Option<Series>,
}

/// Cached, retrying access to market data.
///
/// Every read goes through the shared [`QuoteCache`]; misses are fetched
/// with backoff and normalized before being stored. Failed fetches are
/// stored as placeholders, so no method here returns an error: missing
/// data shows up as `None` fields or [`Snapshot::has_data`] returning false.
pub struct MarketData {
    fetcher: BackoffFetcher,
    cache: Arc<QuoteCache>,
    config: Config,
}

impl std::fmt::Debug for MarketData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketData")
            .field("provider", &self.fetcher.provider().name())
            .field("cache_ttl", &self.cache.ttl())
            .field("config", &self.config)
            .finish()
    }
}

impl MarketData {
    /// Create a service with its own cache.
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: Config) -> Result<Self> {
        let cache = Arc::new(QuoteCache::new(config.cache_ttl));
        Self::with_cache(provider, cache, config)
    }

    /// Create a service over an existing cache.
    ///
    /// The cache's own TTL applies; `config.cache_ttl` is only used by
    /// [`MarketData::new`].
    pub fn with_cache(
        provider: Arc<dyn MarketDataProvider>,
        cache: Arc<QuoteCache>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        debug!(provider = provider.name(), "Creating market data service");
        let fetcher = BackoffFetcher::new(provider, config.backoff.clone())
            .with_history_period(config.history_period);
        Ok(Self {
            fetcher,
            cache,
            config,
        })
    }

    /// The Yahoo Finance provider with default settings.
    #[cfg(feature = "yahoo")]
    pub fn yahoo(config: Config) -> Result<Self> {
        Self::new(Arc::new(dalal_yahoo::YahooProvider::new()), config)
    }

    /// The shared cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Top snapshots from the configured universe, optionally filtered.
    pub async fn list_top(&self, search: Option<&str>) -> Vec<Snapshot> {
        self.query(&self.config.universe, search).await
    }

    /// Up to [`PAGE_SIZE`] snapshots for `symbols`, largest market cap first.
    ///
    /// With a search term, only snapshots whose symbol or name contains it
    /// (case-insensitively) are kept. Ties keep input order.
    pub async fn query(&self, symbols: &[Symbol], search: Option<&str>) -> Vec<Snapshot> {
        let mut options = QueryOptions::new();
        options.search = search.map(str::to_string);
        self.query_with(symbols, &options).await
    }

    /// [`query`](Self::query) with an explicit search scope.
    #[instrument(skip(self, symbols), fields(symbols = symbols.len()))]
    pub async fn query_with(&self, symbols: &[Symbol], options: &QueryOptions) -> Vec<Snapshot> {
        let deadline = Instant::now() + self.config.query_deadline;
        let term = options.term();

        let candidates: Vec<&Symbol> = match (term, options.scope) {
            (Some(term), SearchScope::Symbol) => {
                let needle = term.to_lowercase();
                symbols
                    .iter()
                    .filter(|s| s.as_str().to_lowercase().contains(&needle))
                    .collect()
            }
            _ => symbols.iter().collect(),
        };

        // `buffered` keeps input order, which the stable sort relies on.
        let snapshots: Vec<Snapshot> = stream::iter(candidates)
            .map(|symbol| self.snapshot_before(symbol, deadline))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut results: Vec<Snapshot> = match term {
            Some(term) => snapshots.into_iter().filter(|s| s.matches(term)).collect(),
            None => snapshots,
        };
        results.sort_by(|a, b| b.market_cap_cr.total_cmp(&a.market_cap_cr));
        results.truncate(PAGE_SIZE);

        debug!(returned = results.len(), "Query complete");
        results
    }

    /// Snapshot and history for one symbol.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn detail(&self, symbol: &Symbol) -> Detail {
        let deadline = Instant::now() + self.config.query_deadline;
        let (mut snapshot, series) = tokio::join!(
            self.snapshot_before(symbol, deadline),
            self.history_before(symbol, deadline),
        );

        if let Some(series) = &series {
            apply_series_fallback(&mut snapshot, series);
        }
        Detail { snapshot, series }
    }

    /// Cached snapshot for `symbol`, fetching and normalizing on a miss.
    ///
    /// A failed fetch yields (and caches) [`Snapshot::placeholder`].
    pub async fn snapshot(&self, symbol: &Symbol) -> Snapshot {
        self.cache
            .snapshots()
            .get_or_populate(symbol.clone(), || async {
                match self
                    .fetcher
                    .fetch_quote(symbol, self.config.info_retries)
                    .await
                {
                    FetchOutcome::Success(raw) => normalize(symbol.clone(), &raw),
                    FetchOutcome::Failure(_) => Snapshot::placeholder(symbol.clone()),
                }
            })
            .await
    }

    /// Cached history for `symbol` over the configured period.
    ///
    /// A failed fetch yields (and caches) `None`.
    pub async fn history(&self, symbol: &Symbol) -> Option<Series> {
        let key = (symbol.clone(), self.config.history_period);
        self.cache
            .history()
            .get_or_populate(key, || async {
                self.fetcher
                    .fetch_history(symbol, self.config.history_retries)
                    .await
                    .success()
            })
            .await
    }

    async fn snapshot_before(&self, symbol: &Symbol, deadline: Instant) -> Snapshot {
        match timeout_at(deadline, self.snapshot(symbol)).await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                warn!(symbol = %symbol, "Deadline passed before snapshot was ready");
                Snapshot::placeholder(symbol.clone())
            }
        }
    }

    async fn history_before(&self, symbol: &Symbol, deadline: Instant) -> Option<Series> {
        match timeout_at(deadline, self.history(symbol)).await {
            Ok(series) => series,
            Err(_) => {
                warn!(symbol = %symbol, "Deadline passed before history was ready");
                None
            }
        }
    }
}
