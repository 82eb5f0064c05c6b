//! Cache Metrics Collection
//!
//! Lock-free counters for the local and shared cache tiers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for one [`LoadingCache`](super::LoadingCache)
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    /// Loader executions started
    loads: AtomicU64,
    load_failures: AtomicU64,
    /// Callers that joined a load already in flight
    coalesced: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    /// Exponential moving average of loader latency
    load_latency_us: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_latency(&self, duration: Duration) {
        let new_us = duration.as_micros() as u64;
        let alpha = 0.1;

        loop {
            let current = self.load_latency_us.load(Ordering::Relaxed);
            let updated = if current == 0 {
                new_us
            } else {
                ((1.0 - alpha) * current as f64 + alpha * new_us as f64) as u64
            };

            if self
                .load_latency_us
                .compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn load_failures(&self) -> u64 {
        self.load_failures.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self, entries: usize) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            entries,
            hits: self.hits(),
            misses: self.misses(),
            hit_ratio: self.hit_ratio(),
            loads: self.loads(),
            load_failures: self.load_failures(),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            evictions: self.evictions(),
            expirations: self.expirations.load(Ordering::Relaxed),
            load_latency: Duration::from_micros(self.load_latency_us.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time view of a [`CacheStats`]
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatsSnapshot {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub loads: u64,
    pub load_failures: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub load_latency: Duration,
}

/// Counters for the shared tier
#[derive(Debug, Default)]
pub struct SharedStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

impl SharedStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SharedStatsSnapshot {
        SharedStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a [`SharedStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SharedStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub write_failures: u64,
}

// =============================================================================
// Tests
// =============================================================================
