//! Infrastructure Adapters
//!
//! Implementations of the domain ports and of the shared-store backend,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Ports (Traits)                                │
//! │   PostRepository │ ContentFilter │ SortedSetBackend              │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │   InMemoryPostRepository │ HtmlEscapeFilter │ SensitiveWordFilter│
//! │   FilterChain │ RedisSortedSetBackend (feature `redis-store`)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod memory;
mod sanitize;

#[cfg(feature = "redis-store")]
mod redis_store;

pub use memory::{InMemoryPostRepository, RepositoryStats};
pub use sanitize::{FilterChain, HtmlEscapeFilter, SensitiveWordFilter, REPLACEMENT};

#[cfg(feature = "redis-store")]
pub use redis_store::RedisSortedSetBackend;
