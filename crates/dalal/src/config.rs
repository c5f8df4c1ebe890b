//! Runtime configuration.

use std::time::Duration;

use dalal_core::{DataError, HistoryPeriod, Result, Symbol};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default time-to-live for cached snapshots and histories.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default attempts for snapshot fetches.
pub const DEFAULT_INFO_RETRIES: u32 = 3;

/// Default attempts for history fetches, which cost the upstream more.
pub const DEFAULT_HISTORY_RETRIES: u32 = 2;

/// Symbols shown on the dashboard's home page.
pub const DEFAULT_UNIVERSE: &[&str] = &[
    "RELIANCE.NS",
    "TCS.NS",
    "INFY.NS",
    "HDFCBANK.NS",
    "ICICIBANK.NS",
    "SBIN.NS",
    "BHARTIARTL.NS",
    "ITC.NS",
    "BAJFINANCE.NS",
    "HINDUNILVR.NS",
    "ASIANPAINT.NS",
    "AXISBANK.NS",
    "MARUTI.NS",
    "LT.NS",
    "SUNPHARMA.NS",
    "DMART.NS",
    "TITAN.NS",
    "WIPRO.NS",
    "POWERGRID.NS",
    "NTPC.NS",
];

/// Exponential backoff between fetch attempts.
///
/// The delay before attempt `n + 1` is `initial_delay * multiplier^(n - 1)`,
/// capped at `max_delay`. With `jitter > 0` each sleep is scaled by a random
/// factor in `[1 - jitter, 1 + jitter]` (and capped again); the underlying
/// sequence is unaffected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Fractional jitter in `[0, 1)`. Zero disables it.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Sets the delay before the second attempt.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the ceiling on any single delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the fractional jitter.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// The delay that follows `delay` in the sequence.
    #[must_use]
    pub fn grow(&self, delay: Duration) -> Duration {
        self.scale(delay, self.multiplier)
    }

    /// Applies jitter to a delay from the sequence.
    #[must_use]
    pub fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        self.scale(delay, factor)
    }

    /// `delay * factor`, capped at `max_delay`. Results too large for a
    /// `Duration` saturate to the cap.
    fn scale(&self, delay: Duration, factor: f64) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
            .map_or(self.max_delay, |scaled| scaled.min(self.max_delay))
    }

    fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(DataError::InvalidParameter(format!(
                "backoff multiplier must be finite and at least 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(DataError::InvalidParameter(format!(
                "backoff jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(DataError::InvalidParameter(format!(
                "initial delay {:?} exceeds max delay {:?}",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }
}

/// Configuration for [`MarketData`](crate::MarketData).
///
/// All fields have defaults; override them with the `with_*` methods or
/// deserialize from any serde format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time-to-live for every cache entry, successes and failures alike.
    pub cache_ttl: Duration,
    /// Attempts allowed for a snapshot fetch.
    pub info_retries: u32,
    /// Attempts allowed for a history fetch.
    pub history_retries: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
    /// Span of history fetched for detail pages.
    pub history_period: HistoryPeriod,
    /// Most symbols fetched at once within one query.
    pub max_concurrency: usize,
    /// Time allowed for one query or detail call.
    pub query_deadline: Duration,
    /// Symbols [`list_top`](crate::MarketData::list_top) draws from.
    pub universe: Vec<Symbol>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            info_retries: DEFAULT_INFO_RETRIES,
            history_retries: DEFAULT_HISTORY_RETRIES,
            backoff: BackoffPolicy::default(),
            history_period: HistoryPeriod::default(),
            max_concurrency: 4,
            query_deadline: Duration::from_secs(30),
            universe: DEFAULT_UNIVERSE.iter().copied().map(Symbol::new).collect(),
        }
    }
}

impl Config {
    /// Sets the cache time-to-live.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the attempts for snapshot and history fetches.
    #[must_use]
    pub fn with_retries(mut self, info: u32, history: u32) -> Self {
        self.info_retries = info;
        self.history_retries = history;
        self
    }

    /// Sets the backoff schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the history span for detail pages.
    #[must_use]
    pub fn with_history_period(mut self, period: HistoryPeriod) -> Self {
        self.history_period = period;
        self
    }

    /// Sets how many symbols one query fetches at once.
    #[must_use]
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    /// Sets the deadline for one query or detail call.
    #[must_use]
    pub fn with_query_deadline(mut self, deadline: Duration) -> Self {
        self.query_deadline = deadline;
        self
    }

    /// Replaces the home-page universe.
    #[must_use]
    pub fn with_universe<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        self.universe = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.info_retries == 0 || self.history_retries == 0 {
            return Err(DataError::InvalidParameter(
                "retry counts must allow at least one attempt".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(DataError::InvalidParameter(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.query_deadline.is_zero() {
            return Err(DataError::InvalidParameter(
                "query_deadline must be non-zero".to_string(),
            ));
        }
        self.backoff.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.info_retries, 3);
        assert_eq!(config.history_retries, 2);
        assert_eq!(config.backoff.initial_delay, Duration::from_secs(1));
        assert_eq!(config.backoff.multiplier, 2.0);
        assert_eq!(config.universe.len(), 20);
        assert_eq!(config.universe[0], Symbol::new("RELIANCE.NS"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_grow_doubles_until_cap() {
        let policy = BackoffPolicy::default().with_max_delay(Duration::from_secs(5));
        let mut delay = policy.initial_delay;
        let mut seen = vec![delay];
        for _ in 0..4 {
            delay = policy.grow(delay);
            seen.push(delay);
        }
        assert_eq!(
            seen,
            [1, 2, 4, 5, 5].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn test_grow_saturates_instead_of_overflowing() {
        let policy = BackoffPolicy {
            multiplier: 1e300,
            max_delay: Duration::MAX,
            ..Default::default()
        };
        assert_eq!(policy.grow(Duration::from_secs(1)), Duration::MAX);
        assert_eq!(policy.grow(Duration::MAX), Duration::MAX);

        let capped = BackoffPolicy {
            multiplier: 1e300,
            ..Default::default()
        };
        assert_eq!(capped.grow(Duration::from_secs(1)), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = BackoffPolicy::default().with_jitter(0.5);
        for _ in 0..100 {
            let d = policy.jittered(Duration::from_secs(4));
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(6));
        }
        assert_eq!(
            BackoffPolicy::default().jittered(Duration::from_secs(4)),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::default().with_retries(0, 2).validate().is_err());
        assert!(Config::default().with_max_concurrency(0).validate().is_err());
        assert!(
            Config::default()
                .with_backoff(BackoffPolicy::default().with_jitter(1.5))
                .validate()
                .is_err()
        );
        assert!(
            Config::default()
                .with_backoff(BackoffPolicy::default().with_max_delay(Duration::from_millis(10)))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_non_finite_multiplier() {
        for multiplier in [f64::INFINITY, f64::NAN, 0.5] {
            let backoff = BackoffPolicy {
                multiplier,
                ..Default::default()
            };
            let err = Config::default().with_backoff(backoff).validate().unwrap_err();
            assert!(matches!(err, DataError::InvalidParameter(_)));
        }
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(
            r#"{ "info_retries": 5, "universe": ["tcs.ns"], "history_period": "OneYear" }"#,
        )
        .unwrap();
        assert_eq!(config.info_retries, 5);
        assert_eq!(config.history_retries, 2);
        assert_eq!(config.universe, vec![Symbol::new("TCS.NS")]);
        assert_eq!(config.history_period, HistoryPeriod::OneYear);
    }
}
