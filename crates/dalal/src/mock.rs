//! Scripted provider for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dalal_core::{
    DataError, DataProvider, HistoryPeriod, HistoryProvider, RawFields, Result, Series,
    SnapshotProvider, Symbol,
};
use serde_json::Value;
use tokio::time::{Instant, sleep};

/// Provider whose answers, failures and latency are fixed up front.
#[derive(Debug, Default)]
pub(crate) struct MockProvider {
    fast: HashMap<Symbol, RawFields>,
    full: HashMap<Symbol, RawFields>,
    history: HashMap<Symbol, Series>,
    broken: HashSet<Symbol>,
    rate_limited_fast: Option<Option<Duration>>,
    latency: Duration,
    failures_left: AtomicU32,
    fast_calls: AtomicUsize,
    info_calls: AtomicUsize,
    history_calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

pub(crate) fn fields(value: Value) -> RawFields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_fast(mut self, symbol: &str, value: Value) -> Self {
        self.fast.insert(Symbol::new(symbol), fields(value));
        self
    }

    pub(crate) fn with_full(mut self, symbol: &str, value: Value) -> Self {
        self.full.insert(Symbol::new(symbol), fields(value));
        self
    }

    pub(crate) fn with_history(mut self, symbol: &str, series: Series) -> Self {
        self.history.insert(Symbol::new(symbol), series);
        self
    }

    /// Every call for `symbol` fails.
    pub(crate) fn broken(mut self, symbol: &str) -> Self {
        self.broken.insert(Symbol::new(symbol));
        self
    }

    /// The lightweight endpoint answers with a rate-limit error carrying
    /// `retry_after`.
    pub(crate) fn rate_limited_fast(mut self, retry_after: Option<Duration>) -> Self {
        self.rate_limited_fast = Some(retry_after);
        self
    }

    /// The next `n` calls fail regardless of symbol.
    pub(crate) fn failing_first(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Every call takes `latency` before answering.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn fast_calls(&self) -> usize {
        self.fast_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn upstream_calls(&self) -> usize {
        self.fast_calls() + self.info_calls() + self.history_calls()
    }

    /// Gaps between consecutive upstream calls.
    pub(crate) fn call_gaps(&self) -> Vec<Duration> {
        let times = self.call_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    async fn enter(&self, counter: &AtomicUsize, symbol: &Symbol) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        if self.broken.contains(symbol) {
            return Err(DataError::Network(format!("connection reset for {symbol}")));
        }
        let scripted_failure = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(DataError::Network("scripted failure".to_string()));
        }
        Ok(())
    }
}

impl DataProvider for MockProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    fn description(&self) -> &str {
        "Scripted provider for tests"
    }
}

#[async_trait]
impl SnapshotProvider for MockProvider {
    async fn fetch_fast_info(&self, symbol: &Symbol) -> Result<RawFields> {
        self.enter(&self.fast_calls, symbol).await?;
        if let Some(retry_after) = self.rate_limited_fast {
            return Err(DataError::RateLimited {
                provider: "Mock".to_string(),
                retry_after,
            });
        }
        self.fast
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::NotSupported("no lightweight quote".to_string()))
    }

    async fn fetch_info(&self, symbol: &Symbol) -> Result<RawFields> {
        self.enter(&self.info_calls, symbol).await?;
        self.full
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))
    }
}

#[async_trait]
impl HistoryProvider for MockProvider {
    async fn fetch_history(&self, symbol: &Symbol, _period: HistoryPeriod) -> Result<Series> {
        self.enter(&self.history_calls, symbol).await?;
        self.history
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))
    }
}
