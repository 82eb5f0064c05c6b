//! Domain Layer
//!
//! The discussion-post entity and the ports the cache subsystem consumes.
//!
//! - **Post** (`post.rs`) - Entity and listing value objects
//! - **Ports** (`ports.rs`) - Trait abstractions for external dependencies
//!
//! # Usage
//!
//! ```ignore
//! use postcache::domain::{OrderMode, PostRepository, UserContext};
//!
//! async fn first_page<R: PostRepository>(repo: &R) -> Result<Vec<Post>> {
//!     repo.select_posts(UserContext::Anonymous, 0, 10, OrderMode::Hot).await
//! }
//! ```

pub mod post;
pub mod ports;

pub use post::{OrderMode, Post, PostId, PostStatus, PostType, UserContext, UserId};
pub use ports::{ContentFilter, PostRepository};
