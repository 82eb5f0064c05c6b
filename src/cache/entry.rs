//! Cache Entry Types
//!
//! A memoized value together with its write time, which drives expiry, and
//! a read counter kept for diagnostics. Eviction ranks by recency in the
//! owning LRU, not by this counter.

use std::time::Duration;

use tokio::time::Instant;

/// Cache entry containing a value and its metadata.
///
/// Owned by exactly one [`LoadingCache`](super::LoadingCache).
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    /// Write time; expiry counts from here, not from last access
    inserted_at: Instant,
    /// Reads served from this entry; diagnostic only
    access_count: u32,
}

impl<V> CacheEntry<V> {
    /// Create a new entry written now
    pub fn new(value: V) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            access_count: 0,
        }
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub fn inserted_at(&self) -> Instant {
        self.inserted_at
    }

    #[inline]
    pub fn access_count(&self) -> u32 {
        self.access_count
    }

    /// Record a read and return the new count
    #[inline]
    pub fn record_access(&mut self) -> u32 {
        self.access_count = self.access_count.saturating_add(1);
        self.access_count
    }

    /// Age of the entry since it was written
    #[inline]
    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }

    /// An entry is expired at or after `inserted_at + ttl`.
    #[inline]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}

// =============================================================================
// Tests
// =============================================================================
