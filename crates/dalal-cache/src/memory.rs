//! Generic in-memory cache with a single time-to-live.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

/// Cache entry with the instant it was stored, for TTL checks.
///
/// Entries are never mutated; a `set` replaces the whole entry.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > ttl
    }
}

/// Key-value cache whose entries expire a fixed time after being stored.
///
/// An entry is returned while `now - stored_at <= ttl`. Expired entries stay
/// in the map until the next lookup of their key (or [`purge_expired`])
/// removes them. There is no size bound.
///
/// Concurrent writers to one key are not coordinated: the last `set` wins.
/// Values are cloned out on every hit, so store cheap-to-clone values.
///
/// [`purge_expired`]: TtlCache::purge_expired
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// The time-to-live applied to every entry.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the value for `key` if it is still live.
    ///
    /// An expired entry is evicted as a side effect.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(self.ttl, now) => {
                    debug!("Cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    debug!("Cache miss");
                    return None;
                }
            }
        }

        // Re-check under the write lock: another task may have refreshed it.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(self.ttl, Instant::now()) {
                debug!("Cache hit after refresh");
                return Some(entry.value.clone());
            }
            entries.remove(key);
            trace!("Evicted expired entry");
        }
        debug!("Cache miss (expired)");
        None
    }

    /// Stores `value` under `key`, replacing any previous entry.
    #[instrument(skip(self, value), level = "debug")]
    pub async fn set(&self, key: K, value: V) {
        self.entries
            .write()
            .await
            .insert(key, CacheEntry::new(value));
        debug!("Cached entry");
    }

    /// Returns the live value for `key`, or runs `populate` and caches its
    /// result.
    ///
    /// `populate` is not called while a live entry exists. The lock is not
    /// held while it runs, so two tasks missing the same key at once may
    /// both populate it.
    pub async fn get_or_populate<F, Fut>(&self, key: K, populate: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(&key).await {
            return value;
        }

        let value = populate().await;
        self.set(key, value.clone()).await;
        value
    }

    /// Removes the entry for `key`, returning its value if it was live.
    pub async fn remove(&self, key: &K) -> Option<V> {
        let entry = self.entries.write().await.remove(key)?;
        (!entry.is_expired(self.ttl, Instant::now())).then_some(entry.value)
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes every expired entry.
    ///
    /// Returns the number of entries removed.
    #[instrument(skip(self), level = "debug")]
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.ttl, now));
        let removed = before - entries.len();

        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        removed
    }

    /// Removes every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        debug!("Cleared all cache entries");
    }
}
