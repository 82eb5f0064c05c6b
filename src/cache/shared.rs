//! Shared Cache - Out-of-Process Ordered Tier
//!
//! Second-tier cache over an external scored-set store shared by every
//! process instance. A page is one ordered collection whose members are the
//! page's posts, ranked by each post's `score`.
//!
//! # Design
//!
//! - Pluggable backend (in-memory, Redis) behind [`SortedSetBackend`]
//! - Members are JSON-encoded posts
//! - Writes are all-or-nothing: a page becomes visible in full or not at all
//! - No TTL is applied here; expiry belongs to the store's own configuration

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::metrics::{SharedStats, SharedStatsSnapshot};
use crate::domain::Post;
use crate::error::{Error, Result};

/// A member of an ordered collection and its score
pub type ScoredMember = (String, f64);

/// Shared ordered-store backend
#[async_trait]
pub trait SortedSetBackend: Send + Sync {
    /// Check whether a collection exists at `key`
    async fn exists(&self, key: &str) -> Result<bool>;

    /// All members at `key` in ascending score order
    async fn range_all(&self, key: &str) -> Result<Vec<ScoredMember>>;

    /// Add every member in one transaction.
    ///
    /// Either all members become visible together or, on error, the
    /// collection is left as it was.
    async fn add_all(&self, key: &str, members: Vec<ScoredMember>) -> Result<()>;
}

/// Shared backend statistics
#[derive(Debug, Clone, Default)]
pub struct BackendStats {
    pub collections: u64,
    pub reads: u64,
    pub writes: u64,
}

/// In-memory backend for tests and single-process deployments.
///
/// Each collection is mutated under its DashMap shard lock, which makes a
/// batch add atomic with respect to concurrent readers.
#[derive(Default)]
pub struct InMemorySortedSetBackend {
    sets: DashMap<String, Vec<ScoredMember>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemorySortedSetBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a collection, as the store's own expiry would
    pub fn remove(&self, key: &str) -> bool {
        self.sets.remove(key).is_some()
    }

    /// Number of members at `key`
    pub fn card(&self, key: &str) -> usize {
        self.sets.get(key).map(|set| set.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> BackendStats {
        BackendStats {
            collections: self.sets.len() as u64,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl SortedSetBackend for InMemorySortedSetBackend {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.sets.contains_key(key))
    }

    async fn range_all(&self, key: &str) -> Result<Vec<ScoredMember>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .sets
            .get(key)
            .map(|set| set.value().clone())
            .unwrap_or_default())
    }

    async fn add_all(&self, key: &str, members: Vec<ScoredMember>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);

        // Validate the whole batch before touching the collection
        if let Some((member, _)) = members.iter().find(|(_, score)| score.is_nan()) {
            return Err(Error::SharedWrite {
                key: key.to_string(),
                reason: format!("score is not a float for member {}", member),
            });
        }
        if members.is_empty() {
            return Ok(());
        }

        let mut set = self.sets.entry(key.to_string()).or_default();
        for (member, score) in members {
            // Re-adding a member updates its score
            set.retain(|(existing, _)| existing != &member);
            set.push((member, score));
        }
        // Stable: equal scores keep insertion order
        set.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(())
    }
}

/// Shared tier holding post pages as scored collections
pub struct SharedListCache {
    backend: Arc<dyn SortedSetBackend>,
    stats: SharedStats,
}

impl SharedListCache {
    pub fn new(backend: Arc<dyn SortedSetBackend>) -> Self {
        Self {
            backend,
            stats: SharedStats::default(),
        }
    }

    /// Create with in-memory backend (for testing)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySortedSetBackend::new()))
    }

    /// Check whether a page is present in the shared tier
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let present = self.backend.exists(key).await?;
        if present {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(present)
    }

    /// All posts of the page at `key`, lowest score first
    pub async fn read_ordered(&self, key: &str) -> Result<Vec<Post>> {
        let members = self.backend.range_all(key).await?;
        members
            .into_iter()
            .map(|(member, _)| {
                serde_json::from_str::<Post>(&member).map_err(|e| {
                    Error::SharedStore(format!("undecodable member at {}: {}", key, e))
                })
            })
            .collect()
    }

    /// Store `rows` at `key`, each ranked by its own score, in one transaction
    pub async fn write_ordered(&self, key: &str, rows: &[Post]) -> Result<()> {
        let members = rows
            .iter()
            .map(|post| {
                serde_json::to_string(post)
                    .map(|member| (member, post.score))
                    .map_err(|e| Error::SharedWrite {
                        key: key.to_string(),
                        reason: format!("cannot encode post {}: {}", post.id, e),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        self.stats.record_write();
        let count = members.len();
        self.backend.add_all(key, members).await.map_err(|e| {
            self.stats.record_write_failure();
            match e {
                Error::SharedWrite { .. } => e,
                other => Error::SharedWrite {
                    key: key.to_string(),
                    reason: other.to_string(),
                },
            }
        })?;

        debug!(key = %key, members = count, "Stored page in shared cache");
        Ok(())
    }

    pub fn stats(&self) -> SharedStatsSnapshot {
        self.stats.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
