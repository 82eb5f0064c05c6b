//! Post List Service
//!
//! Applies the caching policy over the two tiers: anonymous hot-ordered pages
//! and the anonymous row count are served through local loading caches, every
//! other request goes straight to the persistent store.
//!
//! Freshness is bounded by the local time-to-live alone. Writes never
//! invalidate either tier.

mod loaders;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::adapters::{FilterChain, HtmlEscapeFilter};
use crate::cache::{
    CacheStatsSnapshot, LoadingCache, LoadingCacheConfig, PageKey, SharedListCache,
    SharedStatsSnapshot,
};
use crate::domain::{
    ContentFilter, OrderMode, Post, PostId, PostRepository, PostStatus, PostType, UserContext,
    UserId,
};
use crate::error::{Error, Result};

use loaders::{PostListLoader, PostRowsLoader};

/// Configuration for both local caches
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceConfig {
    /// Page cache
    pub posts: LoadingCacheConfig,
    /// Row-count cache
    pub rows: LoadingCacheConfig,
}

impl ServiceConfig {
    /// Build both caches from the externally supplied size and expiry
    pub fn new(max_entries: usize, expire_seconds: u64) -> Self {
        let config = LoadingCacheConfig::new(max_entries, Duration::from_secs(expire_seconds));
        Self {
            posts: config.clone(),
            rows: config,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.posts.validate()?;
        self.rows.validate()
    }
}

/// Post list orchestrator
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    shared: Arc<SharedListCache>,
    filter: Arc<dyn ContentFilter>,
    post_lists: LoadingCache<String, Vec<Post>>,
    post_rows: LoadingCache<UserId, u64>,
}

impl PostService {
    /// Build the service and its caches; loaders are bound here once.
    pub fn new(
        config: ServiceConfig,
        repo: Arc<dyn PostRepository>,
        shared: Arc<SharedListCache>,
    ) -> Result<Self> {
        config.validate()?;

        let post_lists = LoadingCache::new(
            "post_list",
            config.posts.clone(),
            Arc::new(PostListLoader::new(repo.clone(), shared.clone())),
        )?;
        let post_rows = LoadingCache::new(
            "post_rows",
            config.rows.clone(),
            Arc::new(PostRowsLoader::new(repo.clone())),
        )?;

        info!(
            max_entries = config.posts.max_entries,
            ttl_secs = config.posts.ttl.as_secs(),
            "Post service initialized"
        );

        Ok(Self {
            repo,
            shared,
            filter: Arc::new(FilterChain::new().with(HtmlEscapeFilter)),
            post_lists,
            post_rows,
        })
    }

    /// Replace the content filter applied by [`PostService::add_post`]
    pub fn with_filter(mut self, filter: impl ContentFilter + 'static) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    /// Only anonymous hot-ordered listings go through the caches
    pub fn is_list_cacheable(user: UserContext, order: OrderMode) -> bool {
        user.is_anonymous() && order == OrderMode::Hot
    }

    /// One page of posts.
    ///
    /// Anonymous hot-ordered pages come from the local cache, falling through
    /// to the shared tier and then the store. Every other combination reads
    /// the store directly.
    pub async fn find_post_list(
        &self,
        user: UserContext,
        offset: u32,
        limit: u32,
        order: OrderMode,
    ) -> Result<Vec<Post>> {
        if limit == 0 {
            return Err(Error::InvalidArgument("limit must be greater than zero".into()));
        }

        if !Self::is_list_cacheable(user, order) {
            debug!(?user, offset, limit, %order, "Post list not cacheable, reading store");
            return self.repo.select_posts(user, offset, limit, order).await;
        }

        let key = PageKey::new(offset, limit).encode();
        self.post_lists.get(key).await.map_err(Self::contract_guard)
    }

    /// Number of listed posts visible to `user`
    pub async fn find_post_row_count(&self, user: UserContext) -> Result<u64> {
        if !user.is_anonymous() {
            debug!(?user, "Row count not cacheable, reading store");
            return self.repo.select_post_rows(user).await;
        }

        self.post_rows
            .get(user.id())
            .await
            .map_err(Self::contract_guard)
    }

    /// Sanitize title and content, then insert. Cached pages are left alone.
    pub async fn add_post(&self, mut post: Post) -> Result<PostId> {
        post.title = self.filter.filter(&post.title);
        post.content = self.filter.filter(&post.content);

        let id = self.repo.insert_post(post).await?;
        debug!(post_id = id, "Post added");
        Ok(id)
    }

    pub async fn find_post_by_id(&self, id: PostId) -> Result<Option<Post>> {
        self.repo.select_post_by_id(id).await
    }

    pub async fn update_comment_count(&self, id: PostId, comment_count: u32) -> Result<u64> {
        self.repo.update_comment_count(id, comment_count).await
    }

    pub async fn update_type(&self, id: PostId, post_type: PostType) -> Result<u64> {
        self.repo.update_type(id, post_type).await
    }

    pub async fn update_status(&self, id: PostId, status: PostStatus) -> Result<u64> {
        self.repo.update_status(id, status).await
    }

    pub async fn update_score(&self, id: PostId, score: f64) -> Result<u64> {
        if score.is_nan() {
            return Err(Error::InvalidArgument("score must be a number".into()));
        }
        self.repo.update_score(id, score).await
    }

    pub fn post_list_stats(&self) -> CacheStatsSnapshot {
        self.post_lists.stats()
    }

    pub fn row_count_stats(&self) -> CacheStatsSnapshot {
        self.post_rows.stats()
    }

    pub fn shared_stats(&self) -> SharedStatsSnapshot {
        self.shared.stats()
    }

    /// A malformed key reaching the loader is a bug in this service
    fn contract_guard(err: Error) -> Error {
        match err {
            Error::InvalidKey { key, reason } => {
                error!(key = %key, reason = %reason, "Malformed page key reached the loader");
                Error::Internal(format!("malformed page key '{}': {}", key, reason))
            }
            other => other,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryPostRepository, SensitiveWordFilter};
    use crate::cache::{ScoredMember, SortedSetBackend};
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    struct RejectingBackend;

    #[async_trait]
    impl SortedSetBackend for RejectingBackend {
        async fn exists(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }

        async fn range_all(&self, _key: &str) -> Result<Vec<ScoredMember>> {
            Ok(Vec::new())
        }

        async fn add_all(&self, key: &str, _members: Vec<ScoredMember>) -> Result<()> {
            Err(Error::SharedWrite {
                key: key.to_string(),
                reason: "EXECABORT".into(),
            })
        }
    }

    fn service_with(repo: Arc<InMemoryPostRepository>, config: ServiceConfig) -> PostService {
        PostService::new(config, repo, Arc::new(SharedListCache::in_memory())).unwrap()
    }

    fn ids(posts: &[Post]) -> Vec<u64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_service_config() {
        let config = ServiceConfig::new(20, 60);
        assert_eq!(config.posts.max_entries, 20);
        assert_eq!(config.rows.ttl, Duration::from_secs(60));
        assert!(config.validate().is_ok());
        assert_matches!(ServiceConfig::new(0, 60).validate(), Err(Error::Config(_)));
        assert_matches!(ServiceConfig::new(5, 0).validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_cache_eligibility() {
        assert!(PostService::is_list_cacheable(UserContext::Anonymous, OrderMode::Hot));
        assert!(!PostService::is_list_cacheable(UserContext::Anonymous, OrderMode::Latest));
        assert!(!PostService::is_list_cacheable(UserContext::User(3), OrderMode::Hot));
    }

    #[tokio::test]
    async fn test_anonymous_hot_page_is_cached() {
        let repo = Arc::new(InMemoryPostRepository::seeded(25));
        let service = service_with(repo.clone(), ServiceConfig::default());

        let first = service
            .find_post_list(UserContext::Anonymous, 0, 10, OrderMode::Hot)
            .await
            .unwrap();
        let second = service
            .find_post_list(UserContext::Anonymous, 0, 10, OrderMode::Hot)
            .await
            .unwrap();

        assert_eq!(ids(&first), (1..=10).collect::<Vec<_>>());
        assert_eq!(first, second);
        assert_eq!(repo.stats().select_posts, 1);
        assert_eq!(service.post_list_stats().hits, 1);
        assert_eq!(service.shared_stats().writes, 1);
    }

    #[tokio::test]
    async fn test_ineligible_requests_bypass_caches() {
        let repo = Arc::new(InMemoryPostRepository::seeded(10));
        let service = service_with(repo.clone(), ServiceConfig::default());

        for _ in 0..3 {
            service
                .find_post_list(UserContext::User(2), 0, 10, OrderMode::Hot)
                .await
                .unwrap();
            service
                .find_post_list(UserContext::Anonymous, 0, 10, OrderMode::Latest)
                .await
                .unwrap();
            assert_eq!(
                service.find_post_row_count(UserContext::User(2)).await.unwrap(),
                2
            );
        }

        assert_eq!(repo.stats().select_posts, 6);
        assert_eq!(repo.stats().select_rows, 3);
        assert_eq!(service.post_list_stats().entries, 0);
        assert_eq!(service.row_count_stats().entries, 0);
        assert_eq!(service.shared_stats(), SharedStatsSnapshot::default());
    }

    #[tokio::test]
    async fn test_anonymous_row_count_is_cached() {
        let repo = Arc::new(InMemoryPostRepository::seeded(25));
        let service = service_with(repo.clone(), ServiceConfig::default());

        assert_eq!(service.find_post_row_count(UserContext::Anonymous).await.unwrap(), 25);
        assert_eq!(service.find_post_row_count(UserContext::Anonymous).await.unwrap(), 25);
        assert_eq!(repo.stats().select_rows, 1);
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let repo = Arc::new(InMemoryPostRepository::seeded(5));
        let service = service_with(repo.clone(), ServiceConfig::default());

        assert_matches!(
            service
                .find_post_list(UserContext::Anonymous, 0, 0, OrderMode::Hot)
                .await,
            Err(Error::InvalidArgument(_))
        );
        assert_eq!(repo.stats().select_posts, 0);
    }

    #[tokio::test]
    async fn test_shared_write_failure_still_serves_rows() {
        let repo = Arc::new(InMemoryPostRepository::seeded(5));
        let shared = Arc::new(SharedListCache::new(Arc::new(RejectingBackend)));
        let service =
            PostService::new(ServiceConfig::default(), repo.clone(), shared).unwrap();

        let rows = service
            .find_post_list(UserContext::Anonymous, 0, 3, OrderMode::Hot)
            .await
            .unwrap();

        assert_eq!(ids(&rows), vec![1, 2, 3]);
        assert_eq!(service.shared_stats().write_failures, 1);
        // local entry is still stored
        assert_eq!(service.post_list_stats().entries, 1);
    }

    #[tokio::test]
    async fn test_store_failure_propagates_and_is_not_cached() {
        let repo = Arc::new(InMemoryPostRepository::seeded(5));
        let service = service_with(repo.clone(), ServiceConfig::default());

        repo.set_fail_reads(true);
        assert_matches!(
            service
                .find_post_list(UserContext::Anonymous, 0, 5, OrderMode::Hot)
                .await,
            Err(Error::Store(_))
        );
        assert_matches!(
            service.find_post_row_count(UserContext::Anonymous).await,
            Err(Error::Store(_))
        );

        repo.set_fail_reads(false);
        let rows = service
            .find_post_list(UserContext::Anonymous, 0, 5, OrderMode::Hot)
            .await
            .unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(repo.stats().select_posts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_tier_serves_after_local_expiry() {
        let repo = Arc::new(InMemoryPostRepository::seeded(25));
        let service = service_with(repo.clone(), ServiceConfig::new(15, 10));

        let first = service
            .find_post_list(UserContext::Anonymous, 10, 10, OrderMode::Hot)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        let second = service
            .find_post_list(UserContext::Anonymous, 10, 10, OrderMode::Hot)
            .await
            .unwrap();

        // same posts, now in the shared tier's ascending score order
        assert_eq!(ids(&first), (11..=20).collect::<Vec<_>>());
        assert_eq!(ids(&second), (11..=20).rev().collect::<Vec<_>>());
        assert_eq!(repo.stats().select_posts, 1);
        assert_eq!(service.shared_stats().hits, 1);
        assert_eq!(service.post_list_stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_writes_do_not_invalidate() {
        let repo = Arc::new(InMemoryPostRepository::seeded(5));
        let service = service_with(repo.clone(), ServiceConfig::default());

        let before = service
            .find_post_list(UserContext::Anonymous, 0, 5, OrderMode::Hot)
            .await
            .unwrap();
        let count = service.find_post_row_count(UserContext::Anonymous).await.unwrap();

        service.add_post(Post::new(1, "new", "body")).await.unwrap();
        assert_eq!(service.update_score(5, 1000.0).await.unwrap(), 1);
        assert_eq!(service.update_status(1, PostStatus::Blocked).await.unwrap(), 1);

        let after = service
            .find_post_list(UserContext::Anonymous, 0, 5, OrderMode::Hot)
            .await
            .unwrap();
        assert_eq!(after, before);
        assert_eq!(
            service.find_post_row_count(UserContext::Anonymous).await.unwrap(),
            count
        );
    }

    #[tokio::test]
    async fn test_add_post_applies_filters() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let service = service_with(repo.clone(), ServiceConfig::default()).with_filter(
            FilterChain::new()
                .with(HtmlEscapeFilter)
                .with(SensitiveWordFilter::new(["casino"])),
        );

        let id = service
            .add_post(Post::new(7, "<b>casino", "casino&win"))
            .await
            .unwrap();

        let stored = service.find_post_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "&lt;b&gt;***");
        assert_eq!(stored.content, "***&amp;win");
        assert_eq!(stored.user_id, 7);
    }

    #[tokio::test]
    async fn test_update_operations() {
        let repo = Arc::new(InMemoryPostRepository::seeded(3));
        let service = service_with(repo.clone(), ServiceConfig::default());

        assert_eq!(service.update_comment_count(2, 9).await.unwrap(), 1);
        assert_eq!(service.update_type(2, PostType::Top).await.unwrap(), 1);
        assert_eq!(service.update_comment_count(42, 1).await.unwrap(), 0);
        assert_matches!(
            service.update_score(1, f64::NAN).await,
            Err(Error::InvalidArgument(_))
        );

        let post = service.find_post_by_id(2).await.unwrap().unwrap();
        assert_eq!(post.comment_count, 9);
        assert_eq!(post.post_type, PostType::Top);
    }

    #[test]
    fn test_contract_guard_maps_invalid_key() {
        assert_matches!(
            PostService::contract_guard(Error::invalid_key("x", "bad")),
            Error::Internal(_)
        );
        assert_matches!(
            PostService::contract_guard(Error::Store("down".into())),
            Error::Store(_)
        );
    }
}
