//! In-Memory Post Repository
//!
//! Implements [`PostRepository`] over a vector, following the store's
//! filtering and ordering contract. Used by tests and by the demo binary.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;

use crate::domain::{
    OrderMode, Post, PostId, PostRepository, PostStatus, PostType, UserContext,
};
use crate::error::{Error, Result};

/// Repository call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    pub select_posts: u64,
    pub select_rows: u64,
    pub inserts: u64,
    pub updates: u64,
}

/// Vector-backed post store
pub struct InMemoryPostRepository {
    posts: RwLock<Vec<Post>>,
    next_id: AtomicU64,
    /// When set, every read fails as an unreachable store would
    fail_reads: AtomicBool,
    select_posts: AtomicU64,
    select_rows: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
}

impl Default for InMemoryPostRepository {
    fn default() -> Self {
        Self {
            posts: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fail_reads: AtomicBool::new(false),
            select_posts: AtomicU64::new(0),
            select_rows: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
            updates: AtomicU64::new(0),
        }
    }
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `posts`; ids are kept as given
    pub fn with_posts(posts: Vec<Post>) -> Self {
        let next_id = posts.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let repo = Self::default();
        *repo.posts.write() = posts;
        repo.next_id.store(next_id, Ordering::Relaxed);
        repo
    }

    /// Create a store with `count` anonymous-visible posts.
    ///
    /// Post `i` (1-based) is authored by user `i % 5 + 1`, one minute apart,
    /// with score `count - i + 1` so that hot order equals id order.
    pub fn seeded(count: u64) -> Self {
        let now = Utc::now();
        let posts = (1..=count)
            .map(|i| {
                let title = format!("Post {}", i);
                let content = format!("Body of post {}", i);
                let mut post = Post::new(i % 5 + 1, title, content)
                    .with_score((count - i + 1) as f64)
                    .with_create_time(now - ChronoDuration::minutes(i as i64));
                post.id = i;
                post
            })
            .collect();
        Self::with_posts(posts)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn stats(&self) -> RepositoryStats {
        RepositoryStats {
            select_posts: self.select_posts.load(Ordering::Relaxed),
            select_rows: self.select_rows.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Store("store unavailable".into()));
        }
        Ok(())
    }

    fn visible(post: &Post, user: UserContext) -> bool {
        post.status.is_listed()
            && match user {
                UserContext::Anonymous => true,
                UserContext::User(id) => post.user_id == id,
            }
    }

    fn update<F>(&self, id: PostId, apply: F) -> u64
    where
        F: FnOnce(&mut Post),
    {
        self.updates.fetch_add(1, Ordering::Relaxed);
        let mut posts = self.posts.write();
        match posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                apply(post);
                1
            }
            None => 0,
        }
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn select_posts(
        &self,
        user: UserContext,
        offset: u32,
        limit: u32,
        order: OrderMode,
    ) -> Result<Vec<Post>> {
        self.select_posts.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;

        let mut rows: Vec<Post> = self
            .posts
            .read()
            .iter()
            .filter(|p| Self::visible(p, user))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let by_type = b.post_type.cmp(&a.post_type);
            let by_time = b.create_time.cmp(&a.create_time);
            match order {
                OrderMode::Latest => by_type.then(by_time),
                OrderMode::Hot => by_type
                    .then(b.score.total_cmp(&a.score))
                    .then(by_time),
            }
        });

        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn select_post_rows(&self, user: UserContext) -> Result<u64> {
        self.select_rows.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;

        Ok(self
            .posts
            .read()
            .iter()
            .filter(|p| Self::visible(p, user))
            .count() as u64)
    }

    async fn select_post_by_id(&self, id: PostId) -> Result<Option<Post>> {
        self.check_available()?;
        Ok(self.posts.read().iter().find(|p| p.id == id).cloned())
    }

    async fn insert_post(&self, mut post: Post) -> Result<PostId> {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        post.id = id;
        self.posts.write().push(post);
        Ok(id)
    }

    async fn update_comment_count(&self, id: PostId, comment_count: u32) -> Result<u64> {
        Ok(self.update(id, |p| p.comment_count = comment_count))
    }

    async fn update_type(&self, id: PostId, post_type: PostType) -> Result<u64> {
        Ok(self.update(id, |p| p.post_type = post_type))
    }

    async fn update_status(&self, id: PostId, status: PostStatus) -> Result<u64> {
        Ok(self.update(id, |p| p.status = status))
    }

    async fn update_score(&self, id: PostId, score: f64) -> Result<u64> {
        Ok(self.update(id, |p| p.score = score))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ids(posts: &[Post]) -> Vec<u64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_hot_order_pages() {
        let repo = InMemoryPostRepository::seeded(25);

        let first = repo
            .select_posts(UserContext::Anonymous, 0, 10, OrderMode::Hot)
            .await
            .unwrap();
        assert_eq!(ids(&first), (1..=10).collect::<Vec<_>>());

        let last = repo
            .select_posts(UserContext::Anonymous, 20, 10, OrderMode::Hot)
            .await
            .unwrap();
        assert_eq!(ids(&last), (21..=25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_pinned_posts_come_first() {
        let repo = InMemoryPostRepository::seeded(5);
        assert_eq!(repo.update_type(4, PostType::Top).await.unwrap(), 1);

        let rows = repo
            .select_posts(UserContext::Anonymous, 0, 5, OrderMode::Hot)
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![4, 1, 2, 3, 5]);
    }

    #[tokio::test]
    async fn test_latest_order_ignores_score() {
        let repo = InMemoryPostRepository::seeded(3);
        repo.update_score(3, 100.0).await.unwrap();

        let rows = repo
            .select_posts(UserContext::Anonymous, 0, 3, OrderMode::Latest)
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_user_filter_and_blocked_posts() {
        let repo = InMemoryPostRepository::seeded(10);
        repo.update_status(5, PostStatus::Blocked).await.unwrap();

        assert_eq!(repo.select_post_rows(UserContext::Anonymous).await.unwrap(), 9);

        // user 2 authored posts 1, 6
        let rows = repo
            .select_posts(UserContext::User(2), 0, 10, OrderMode::Latest)
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![1, 6]);
        assert_eq!(repo.select_post_rows(UserContext::User(2)).await.unwrap(), 2);

        // blocked posts stay reachable by id
        let blocked = repo.select_post_by_id(5).await.unwrap().unwrap();
        assert_eq!(blocked.status, PostStatus::Blocked);
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let repo = InMemoryPostRepository::seeded(2);
        let id = repo.insert_post(Post::new(9, "t", "c")).await.unwrap();
        assert_eq!(id, 3);
        assert_eq!(repo.select_post_by_id(3).await.unwrap().unwrap().user_id, 9);
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let repo = InMemoryPostRepository::new();
        assert_eq!(repo.update_comment_count(99, 3).await.unwrap(), 0);
        assert_eq!(repo.stats().updates, 1);
    }

    #[tokio::test]
    async fn test_failing_reads() {
        let repo = InMemoryPostRepository::seeded(1);
        repo.set_fail_reads(true);

        assert_matches!(
            repo.select_posts(UserContext::Anonymous, 0, 1, OrderMode::Hot).await,
            Err(Error::Store(_))
        );
        assert_matches!(
            repo.select_post_rows(UserContext::Anonymous).await,
            Err(Error::Store(_))
        );
        assert_eq!(repo.stats().select_posts, 1);
        assert_eq!(repo.stats().select_rows, 1);
    }
}
