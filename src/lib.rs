//! Postcache - Two-Tier Post List Cache
//!
//! A read-through cache for paginated, hot-ordered post listings. A bounded,
//! time-expiring local cache sits in front of a shared ordered store, which
//! sits in front of the persistent post store.
//!
//! # Architecture
//!
//! ```text
//! PostService (policy) → LoadingCache (local) → SharedListCache (shared) → PostRepository
//! ```
//!
//! Only anonymous, hot-ordered page requests and the anonymous row count are
//! cached. Concurrent misses on the same key trigger a single load.
//!
//! # Modules
//!
//! - [`adapters`] - In-memory store, content filters, Redis backend (feature-gated)
//! - [`cache`] - Page key codec, loading cache, shared tier
//! - [`domain`] - Post entity and ports
//! - [`error`] - Error types
//! - [`monitoring`] - Prometheus exposition of cache counters
//! - [`service`] - Post list orchestrator

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;
pub mod monitoring;
pub mod service;

// Re-export commonly used types
pub use cache::{LoadingCache, LoadingCacheConfig, PageKey, SharedListCache, SortedSetBackend};
pub use domain::{OrderMode, Post, PostRepository, UserContext};
pub use error::{Error, Result};
pub use service::{PostService, ServiceConfig};
