//! Loading Cache - Bounded Local Tier
//!
//! In-process memoization of an async loader with LRU capacity bound,
//! expire-after-write TTL and single-flight loads.
//!
//! # Design
//!
//! - Live entries sit in an `LruCache` behind a `parking_lot::Mutex`
//! - Each miss either joins the load already in flight for its key or starts
//!   one on a spawned task; the task's outcome is fanned out to every waiter
//!   through a `Shared` future
//! - Loads run detached from their callers, so a caller that gives up never
//!   cancels the load other waiters depend on
//! - Failures are handed to every waiter and never stored
//!
//! Per key: `ABSENT -> LOADING -> PRESENT -> (ttl) -> ABSENT`, and
//! `LOADING -> ABSENT` when the loader fails.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::metrics::{CacheStats, CacheStatsSnapshot};
use super::{DEFAULT_LOCAL_MAX_ENTRIES, DEFAULT_LOCAL_TTL};
use crate::error::{Error, Result};

/// Computes the value for a key on a cache miss
#[async_trait]
pub trait CacheLoader<K, V>: Send + Sync {
    async fn load(&self, key: &K) -> Result<V>;
}

/// Adapts an async closure into a [`CacheLoader`]
pub struct FnLoader<F>(pub F);

#[async_trait]
impl<K, V, F, Fut> CacheLoader<K, V> for FnLoader<F>
where
    K: Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(K) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    async fn load(&self, key: &K) -> Result<V> {
        (self.0)(key.clone()).await
    }
}

/// Loading cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingCacheConfig {
    /// Maximum number of entries before LRU eviction
    pub max_entries: usize,
    /// Time-to-live measured from write
    pub ttl: Duration,
}

impl Default for LoadingCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_LOCAL_MAX_ENTRIES,
            ttl: DEFAULT_LOCAL_TTL,
        }
    }
}

impl LoadingCacheConfig {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self { max_entries, ttl }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::Config("max_entries must be greater than zero".into()));
        }
        if self.ttl.is_zero() {
            return Err(Error::Config("ttl must be greater than zero".into()));
        }
        Ok(())
    }
}

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V>>>;

struct Inner<K, V> {
    /// Name used in logs and metrics
    name: &'static str,
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    /// Loads currently running, one per key
    in_flight: Mutex<HashMap<K, SharedLoad<V>>>,
    loader: Arc<dyn CacheLoader<K, V>>,
    config: LoadingCacheConfig,
    stats: CacheStats,
}

/// Bounded, TTL-expiring, single-flight cache in front of a loader.
///
/// Cloning is cheap and yields a handle to the same cache.
pub struct LoadingCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for LoadingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> LoadingCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache backed by `loader`
    pub fn new(
        name: &'static str,
        config: LoadingCacheConfig,
        loader: Arc<dyn CacheLoader<K, V>>,
    ) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_entries)
            .ok_or_else(|| Error::Config("max_entries must be greater than zero".into()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                entries: Mutex::new(LruCache::new(capacity)),
                in_flight: Mutex::new(HashMap::new()),
                loader,
                config,
                stats: CacheStats::new(),
            }),
        })
    }

    /// Create a cache backed by an async closure
    pub fn from_fn<F, Fut>(name: &'static str, config: LoadingCacheConfig, f: F) -> Result<Self>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        Self::new(name, config, Arc::new(FnLoader(f)))
    }

    /// Return the live value for `key`, loading it on a miss.
    ///
    /// Concurrent misses on the same key share one loader execution and all
    /// observe its outcome. Misses on different keys load independently.
    pub async fn get(&self, key: K) -> Result<V> {
        if let Some(value) = self.inner.lookup(&key) {
            self.inner.stats.record_hit();
            return Ok(value);
        }
        self.inner.stats.record_miss();

        let load = {
            let mut in_flight = self.inner.in_flight.lock();

            // A load may have completed between the lookup above and taking
            // the lock; the task stores its value before leaving `in_flight`.
            if let Some(value) = self.inner.lookup(&key) {
                return Ok(value);
            }

            match in_flight.get(&key) {
                Some(load) => {
                    self.inner.stats.record_coalesced();
                    load.clone()
                }
                None => {
                    let load = Inner::spawn_load(&self.inner, key.clone());
                    in_flight.insert(key, load.clone());
                    load
                }
            }
        };

        load.await
    }

    /// Return the live value for `key` without loading
    pub fn get_if_present(&self, key: &K) -> Option<V> {
        self.inner.lookup(key)
    }

    /// True if a live entry exists; does not affect recency
    pub fn contains(&self, key: &K) -> bool {
        self.inner
            .entries
            .lock()
            .peek(key)
            .map(|entry| !entry.is_expired(self.inner.config.ttl))
            .unwrap_or(false)
    }

    /// Reads served by the live entry for `key`; does not affect recency
    pub fn access_count(&self, key: &K) -> Option<u32> {
        self.inner
            .entries
            .lock()
            .peek(key)
            .filter(|entry| !entry.is_expired(self.inner.config.ttl))
            .map(CacheEntry::access_count)
    }

    /// Drop the entry for `key`, returning whether one was present
    pub fn invalidate(&self, key: &K) -> bool {
        self.inner.entries.lock().pop(key).is_some()
    }

    /// Drop all entries. Loads in flight still complete and store.
    pub fn clear(&self) {
        self.inner.entries.lock().clear();
    }

    /// Stored entries, including expired ones not yet collected
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a load running
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn config(&self) -> &LoadingCacheConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot(self.len())
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Live value for `key`, removing it if expired
    fn lookup(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let expired = match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(self.config.ttl) => {
                entry.record_access();
                return Some(entry.value().clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            self.stats.record_expiration();
            debug!(cache = self.name, key = ?key, "Entry expired");
        }
        None
    }

    fn store(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key.clone(), CacheEntry::new(value)) {
            if evicted != key {
                self.stats.record_eviction();
                debug!(cache = self.name, key = ?evicted, "Evicted least recently used entry");
            }
        }
    }

    fn spawn_load(inner: &Arc<Self>, key: K) -> SharedLoad<V> {
        let task_inner = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: Arc::clone(&task_inner),
                key: key.clone(),
            };

            task_inner.stats.record_load();
            let started = Instant::now();
            let result = task_inner.loader.load(&key).await;
            task_inner.stats.record_load_latency(started.elapsed());

            match &result {
                Ok(value) => task_inner.store(key, value.clone()),
                Err(e) => {
                    task_inner.stats.record_load_failure();
                    warn!(cache = task_inner.name, key = ?key, error = %e, "Cache load failed");
                }
            }
            result
        });

        let name = inner.name;
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::LoadAborted(format!("{} loader task: {}", name, e))),
            }
        }
        .boxed()
        .shared()
    }
}

/// Clears a key's in-flight slot when its load task finishes or unwinds
struct InFlightGuard<K: Eq + Hash, V> {
    inner: Arc<Inner<K, V>>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for InFlightGuard<K, V> {
    fn drop(&mut self) {
        self.inner.in_flight.lock().remove(&self.key);
    }
}

// =============================================================================
// Tests
// =============================================================================
