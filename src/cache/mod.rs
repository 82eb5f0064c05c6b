//! Two-Tier Post List Cache
//!
//! Bounded in-process loading caches in front of a shared, out-of-process
//! ordered store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          PostService (policy)                             │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  Local Tier (per process)        │  Shared Tier (all processes)          │
//! │  ┌────────────────────────────┐  │  ┌─────────────────────────────────┐  │
//! │  │ LoadingCache<String, Page> │──┼─▶│ SharedListCache                 │  │
//! │  │ LoadingCache<u64, u64>     │  │  │ (scored collections per page)   │  │
//! │  │ LRU + TTL + single-flight  │  │  └─────────────────────────────────┘  │
//! │  └────────────────────────────┘  │                 │                     │
//! │                │                 │                 ▼                     │
//! │                └─────────────────┴───────▶ Persistent store              │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads fall through local → shared → store; a store hit repopulates the
//! shared tier and then the local entry.

mod entry;
mod key;
mod loading;
mod metrics;
mod shared;

pub use entry::CacheEntry;
pub use key::{PageKey, KEY_SEPARATOR};
pub use loading::{CacheLoader, FnLoader, LoadingCache, LoadingCacheConfig};
pub use metrics::{CacheStats, CacheStatsSnapshot, SharedStats, SharedStatsSnapshot};
pub use shared::{
    BackendStats, InMemorySortedSetBackend, ScoredMember, SharedListCache, SortedSetBackend,
};

use std::time::Duration;

/// Default local capacity, in pages
pub const DEFAULT_LOCAL_MAX_ENTRIES: usize = 15;

/// Default local time-to-live
pub const DEFAULT_LOCAL_TTL: Duration = Duration::from_secs(180);
