//! Snapshot and history caches shared by one deployment.

use std::time::Duration;

use dalal_core::{HistoryPeriod, Series, Snapshot, Symbol};

use crate::memory::TtlCache;

/// Cache key for a history entry.
pub type HistoryKey = (Symbol, HistoryPeriod);

/// The process-wide cache bundle.
///
/// Create one at startup and hand it (behind an `Arc`) to every service
/// that reads market data; drop it at shutdown. Both halves share one TTL.
///
/// Failed fetches are cached too: a [`Snapshot::placeholder`] for
/// snapshots and `None` for history, so a failing symbol is not retried
/// upstream until its entry expires.
#[derive(Debug)]
pub struct QuoteCache {
    snapshots: TtlCache<Symbol, Snapshot>,
    history: TtlCache<HistoryKey, Option<Series>>,
}

impl QuoteCache {
    /// Create empty caches whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshots: TtlCache::new(ttl),
            history: TtlCache::new(ttl),
        }
    }

    /// The time-to-live applied to every entry.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.snapshots.ttl()
    }

    /// Normalized snapshots keyed by symbol.
    #[must_use]
    pub const fn snapshots(&self) -> &TtlCache<Symbol, Snapshot> {
        &self.snapshots
    }

    /// Price histories keyed by symbol and period; `None` marks a failed fetch.
    #[must_use]
    pub const fn history(&self) -> &TtlCache<HistoryKey, Option<Series>> {
        &self.history
    }

    /// Removes every expired entry from both caches.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        self.snapshots.purge_expired().await + self.history.purge_expired().await
    }

    /// Removes every entry from both caches.
    pub async fn clear(&self) {
        self.snapshots.clear().await;
        self.history.clear().await;
    }
}
