//! Upstream fetches with bounded retries and exponential backoff.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dalal_core::{
    DataError, DataProvider, FetchMode, HistoryPeriod, MarketDataProvider, RawQuote, Result,
    Series, Symbol,
};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::config::BackoffPolicy;

/// What a successful fetch produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Raw snapshot fields, from [`FetchMode::Info`].
    Quote(RawQuote),
    /// Daily closes, from [`FetchMode::History`].
    History(Series),
}

/// Why a fetch gave up.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchFailure {
    /// The symbol that was requested.
    pub symbol: Symbol,
    /// Which upstream operation was attempted.
    pub mode: FetchMode,
    /// Number of upstream attempts made.
    pub attempts: u32,
    /// The final attempt's error.
    pub last_error: DataError,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetch for {} failed after {} attempt(s): {}",
            self.mode, self.symbol, self.attempts, self.last_error
        )
    }
}

impl From<FetchFailure> for DataError {
    fn from(failure: FetchFailure) -> Self {
        Self::Exhausted {
            symbol: failure.symbol.to_string(),
            mode: failure.mode,
            attempts: failure.attempts,
            last_error: failure.last_error.to_string(),
        }
    }
}

/// Result of a fetch: a payload, or the record of every attempt failing.
///
/// Running out of attempts is an expected outcome under upstream rate
/// limiting, so it is a variant rather than an error.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome<T = Payload> {
    /// An attempt succeeded.
    Success(T),
    /// Every attempt failed.
    Failure(FetchFailure),
}

impl<T> FetchOutcome<T> {
    /// Returns true for [`FetchOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The payload, discarding the failure record.
    #[must_use]
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Converts into a `Result`, mapping failure to [`DataError::Exhausted`].
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(failure.into()),
        }
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            Self::Success(value) => FetchOutcome::Success(f(value)),
            Self::Failure(failure) => FetchOutcome::Failure(failure),
        }
    }
}

/// Attempt counter and pending delay for one fetch call.
#[derive(Clone, Debug)]
pub struct RetryState<'a> {
    policy: &'a BackoffPolicy,
    attempt: u32,
    next_delay: Duration,
}

impl<'a> RetryState<'a> {
    /// Starts before the first attempt.
    #[must_use]
    pub fn new(policy: &'a BackoffPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            next_delay: policy.initial_delay.min(policy.max_delay),
        }
    }

    /// Attempts started so far.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Records the start of an attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Returns how long to sleep before the next attempt and grows the
    /// delay for the one after.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next_delay;
        self.next_delay = self.policy.grow(delay);
        self.policy.jittered(delay)
    }
}

/// Calls a provider until it succeeds or the retry budget is spent.
///
/// Sleeps between attempts are async timers, so other tasks keep running
/// while one symbol backs off. The fetcher holds no state between calls.
#[derive(Clone)]
pub struct BackoffFetcher {
    provider: Arc<dyn MarketDataProvider>,
    backoff: BackoffPolicy,
    history_period: HistoryPeriod,
}

impl fmt::Debug for BackoffFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffFetcher")
            .field("provider", &self.provider.name())
            .field("backoff", &self.backoff)
            .field("history_period", &self.history_period)
            .finish()
    }
}

impl BackoffFetcher {
    /// Create a fetcher over `provider` using `backoff` between attempts.
    #[must_use]
    pub fn new(provider: Arc<dyn MarketDataProvider>, backoff: BackoffPolicy) -> Self {
        Self {
            provider,
            backoff,
            history_period: HistoryPeriod::default(),
        }
    }

    /// Sets the span requested by history fetches.
    #[must_use]
    pub const fn with_history_period(mut self, period: HistoryPeriod) -> Self {
        self.history_period = period;
        self
    }

    /// The upstream provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    /// Fetches `symbol` in `mode`, making at most `max_retries` upstream
    /// attempts (at least one).
    pub async fn fetch(&self, symbol: &Symbol, mode: FetchMode, max_retries: u32) -> FetchOutcome {
        match mode {
            FetchMode::Info => self
                .fetch_quote(symbol, max_retries)
                .await
                .map(Payload::Quote),
            FetchMode::History => self
                .fetch_history(symbol, max_retries)
                .await
                .map(Payload::History),
        }
    }

    /// [`fetch`](Self::fetch) in [`FetchMode::Info`], typed.
    pub async fn fetch_quote(&self, symbol: &Symbol, max_retries: u32) -> FetchOutcome<RawQuote> {
        self.retry(symbol, FetchMode::Info, max_retries, || self.quote_once(symbol))
            .await
    }

    /// [`fetch`](Self::fetch) in [`FetchMode::History`], typed.
    pub async fn fetch_history(&self, symbol: &Symbol, max_retries: u32) -> FetchOutcome<Series> {
        self.retry(symbol, FetchMode::History, max_retries, || {
            self.provider.fetch_history(symbol, self.history_period)
        })
        .await
    }

    /// One Info attempt: the lightweight quote if the provider has one,
    /// otherwise the full quote.
    ///
    /// Only an unsupported or empty lightweight quote leads to the full
    /// call; any other error fails the attempt.
    async fn quote_once(&self, symbol: &Symbol) -> Result<RawQuote> {
        match self.provider.fetch_fast_info(symbol).await {
            Ok(fields) if !fields.is_empty() => return Ok(RawQuote::from_fast(fields)),
            Ok(_) => debug!("Lightweight quote empty, falling back to full quote"),
            Err(DataError::NotSupported(reason)) => {
                debug!(reason = %reason, "Lightweight quote unsupported, falling back to full quote");
            }
            // A failing upstream is not asked for the heavier representation.
            Err(e) => return Err(e),
        }

        let fields = self.provider.fetch_info(symbol).await?;
        if fields.is_empty() {
            return Err(DataError::DataNotAvailable {
                symbol: symbol.to_string(),
                reason: "full quote was empty".to_string(),
            });
        }
        Ok(RawQuote::from_full(fields))
    }

    #[instrument(skip_all, fields(provider = %self.provider.name(), symbol = %symbol, mode = %mode))]
    async fn retry<T, F, Fut>(
        &self,
        symbol: &Symbol,
        mode: FetchMode,
        max_retries: u32,
        mut op: F,
    ) -> FetchOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = max_retries.max(1);
        let mut state = RetryState::new(&self.backoff);

        loop {
            let attempt = state.begin_attempt();
            debug!(attempt, max_attempts, "Fetching from upstream");

            let error = match op().await {
                Ok(value) => return FetchOutcome::Success(value),
                Err(error) => error,
            };

            warn!(attempt, max_attempts, error = %error, "Upstream attempt failed");

            if attempt >= max_attempts {
                let failure = FetchFailure {
                    symbol: symbol.clone(),
                    mode,
                    attempts: attempt,
                    last_error: error,
                };
                warn!("{failure}");
                return FetchOutcome::Failure(failure);
            }

            let mut delay = state.next_delay();
            if let Some(hint) = error.retry_after() {
                delay = delay.max(hint).min(self.backoff.max_delay);
                debug!(?hint, "Provider asked us to wait");
            }
            debug!(?delay, "Backing off before retry");
            sleep(delay).await;
        }
    }
}
