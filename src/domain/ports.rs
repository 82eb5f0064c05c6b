//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! Narrow contracts for the collaborators the post cache consumes but does
//! not own. Adapters in [`crate::adapters`] implement them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │        PostRepository │ ContentFilter               │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  InMemoryPostRepository │ HtmlEscapeFilter │ ...    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use super::post::{OrderMode, Post, PostId, PostStatus, PostType, UserContext};
use crate::error::Result;

// =============================================================================
// Persistent Store Port
// =============================================================================

/// Port for the relational store holding discussion posts.
///
/// Implementations own their own timeouts; a call that cannot complete must
/// return an error rather than hang.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Fetch one page of listed posts.
    ///
    /// Blocked posts are excluded; a non-anonymous context restricts the page
    /// to that author's posts.
    async fn select_posts(
        &self,
        user: UserContext,
        offset: u32,
        limit: u32,
        order: OrderMode,
    ) -> Result<Vec<Post>>;

    /// Count listed posts under the same filter as `select_posts`.
    async fn select_post_rows(&self, user: UserContext) -> Result<u64>;

    /// Fetch a single post regardless of status.
    async fn select_post_by_id(&self, id: PostId) -> Result<Option<Post>>;

    /// Insert a post and return its assigned id.
    async fn insert_post(&self, post: Post) -> Result<PostId>;

    /// Returns the number of affected rows.
    async fn update_comment_count(&self, id: PostId, comment_count: u32) -> Result<u64>;

    /// Returns the number of affected rows.
    async fn update_type(&self, id: PostId, post_type: PostType) -> Result<u64>;

    /// Returns the number of affected rows.
    async fn update_status(&self, id: PostId, status: PostStatus) -> Result<u64>;

    /// Returns the number of affected rows.
    async fn update_score(&self, id: PostId, score: f64) -> Result<u64>;
}

// =============================================================================
// Content Filter Port
// =============================================================================

/// Port for sanitizing user-authored text before it is persisted.
pub trait ContentFilter: Send + Sync {
    fn filter(&self, text: &str) -> String;
}
