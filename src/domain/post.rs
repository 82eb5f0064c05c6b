//! Discussion Post Entity
//!
//! The post row as the cache sees it, plus the small value objects that
//! parameterise a listing request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Value Objects
// =============================================================================

/// Post identifier
pub type PostId = u64;

/// Author / requesting user identifier
pub type UserId = u64;

/// Pinning type of a post
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum PostType {
    #[default]
    Normal,
    Top,
}

impl PostType {
    pub fn code(self) -> i32 {
        match self {
            PostType::Normal => 0,
            PostType::Top => 1,
        }
    }
}

/// Moderation status of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PostStatus {
    #[default]
    Normal,
    Featured,
    Blocked,
}

impl PostStatus {
    /// Blocked posts never appear in listings or counts.
    pub fn is_listed(self) -> bool {
        self != PostStatus::Blocked
    }
}

/// Ordering of a post listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderMode {
    /// Newest first
    #[default]
    Latest,
    /// Highest popularity score first
    Hot,
}

impl std::fmt::Display for OrderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderMode::Latest => write!(f, "latest"),
            OrderMode::Hot => write!(f, "hot"),
        }
    }
}

impl std::str::FromStr for OrderMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" | "0" => Ok(OrderMode::Latest),
            "hot" | "1" => Ok(OrderMode::Hot),
            other => Err(crate::error::Error::InvalidArgument(format!(
                "unknown order mode: {}",
                other
            ))),
        }
    }
}

/// Who is asking for a listing.
///
/// Anonymous requests see the site-wide aggregate; a user context scopes the
/// listing to that author's posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserContext {
    #[default]
    Anonymous,
    User(UserId),
}

impl UserContext {
    /// Map the wire identifier, where 0 means anonymous.
    pub fn from_id(id: UserId) -> Self {
        if id == 0 {
            UserContext::Anonymous
        } else {
            UserContext::User(id)
        }
    }

    /// Wire identifier, 0 for anonymous.
    pub fn id(self) -> UserId {
        match self {
            UserContext::Anonymous => 0,
            UserContext::User(id) => id,
        }
    }

    pub fn is_anonymous(self) -> bool {
        self == UserContext::Anonymous
    }
}

// =============================================================================
// Post
// =============================================================================

/// A discussion post.
///
/// `score` is the popularity value used as the sort key in the shared
/// ordered store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub status: PostStatus,
    pub create_time: DateTime<Utc>,
    pub comment_count: u32,
    pub score: f64,
}

impl Post {
    /// Create a new unsaved post (id 0) authored now.
    pub fn new(user_id: UserId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            user_id,
            title: title.into(),
            content: content.into(),
            post_type: PostType::Normal,
            status: PostStatus::Normal,
            create_time: Utc::now(),
            comment_count: 0,
            score: 0.0,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_create_time(mut self, create_time: DateTime<Utc>) -> Self {
        self.create_time = create_time;
        self
    }
}
