//! Cache Loaders
//!
//! Miss handlers bound at construction to the collaborators they read from.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::{CacheLoader, PageKey, SharedListCache};
use crate::domain::{OrderMode, Post, PostRepository, UserContext, UserId};
use crate::error::Result;

/// Loads an anonymous hot-ordered page: shared tier first, then the store.
pub(crate) struct PostListLoader {
    repo: Arc<dyn PostRepository>,
    shared: Arc<SharedListCache>,
}

impl PostListLoader {
    pub(crate) fn new(repo: Arc<dyn PostRepository>, shared: Arc<SharedListCache>) -> Self {
        Self { repo, shared }
    }
}

#[async_trait]
impl CacheLoader<String, Vec<Post>> for PostListLoader {
    async fn load(&self, key: &String) -> Result<Vec<Post>> {
        // Malformed keys must never reach either store
        let page = PageKey::decode(key)?;

        if self.shared.exists(key).await? {
            debug!(key = %key, "Local cache miss, reading page from shared cache");
            let rows = self.shared.read_ordered(key).await?;
            if !rows.is_empty() {
                return Ok(rows);
            }
            // Removed between the existence check and the read
            debug!(key = %key, "Shared page vanished before read, treating as miss");
        }

        debug!(key = %key, "Local and shared cache miss, reading page from store");
        let rows = self
            .repo
            .select_posts(UserContext::Anonymous, page.offset, page.limit, OrderMode::Hot)
            .await?;

        if let Err(e) = self.shared.write_ordered(key, &rows).await {
            warn!(key = %key, error = %e, "Shared cache population failed, serving store rows");
        }

        Ok(rows)
    }
}

/// Loads a row count straight from the store
pub(crate) struct PostRowsLoader {
    repo: Arc<dyn PostRepository>,
}

impl PostRowsLoader {
    pub(crate) fn new(repo: Arc<dyn PostRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl CacheLoader<UserId, u64> for PostRowsLoader {
    async fn load(&self, user_id: &UserId) -> Result<u64> {
        debug!(user_id, "Local cache miss, counting rows in store");
        self.repo
            .select_post_rows(UserContext::from_id(*user_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryPostRepository;
    use crate::cache::{ScoredMember, SortedSetBackend};
    use crate::domain::PostType;
    use crate::error::Error;
    use assert_matches::assert_matches;

    /// Reports every key present but holds no members
    struct VanishingBackend;

    #[async_trait]
    impl SortedSetBackend for VanishingBackend {
        async fn exists(&self, _key: &str) -> Result<bool> {
            Ok(true)
        }

        async fn range_all(&self, _key: &str) -> Result<Vec<ScoredMember>> {
            Ok(Vec::new())
        }

        async fn add_all(&self, _key: &str, _members: Vec<ScoredMember>) -> Result<()> {
            Ok(())
        }
    }

    fn ids(posts: &[Post]) -> Vec<u64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_malformed_key_never_reaches_stores() {
        let repo = Arc::new(InMemoryPostRepository::seeded(5));
        let shared = Arc::new(SharedListCache::in_memory());
        let loader = PostListLoader::new(repo.clone(), shared.clone());

        for key in ["", "0", "0:10:5", "a:b", "0:0"] {
            assert_matches!(
                loader.load(&key.to_string()).await,
                Err(Error::InvalidKey { .. })
            );
        }

        assert_eq!(repo.stats().select_posts, 0);
        let shared_stats = shared.stats();
        assert_eq!(shared_stats.hits + shared_stats.misses, 0);
    }

    #[tokio::test]
    async fn test_store_rows_populate_shared_tier() {
        let repo = Arc::new(InMemoryPostRepository::seeded(5));
        let shared = Arc::new(SharedListCache::in_memory());
        let loader = PostListLoader::new(repo.clone(), shared.clone());

        let from_store = loader.load(&"0:3".to_string()).await.unwrap();
        assert_eq!(ids(&from_store), vec![1, 2, 3]);
        assert!(shared.exists("0:3").await.unwrap());

        // shared tier serves the page lowest score first
        let from_shared = loader.load(&"0:3".to_string()).await.unwrap();
        assert_eq!(ids(&from_shared), vec![3, 2, 1]);
        assert_eq!(repo.stats().select_posts, 1);
    }

    #[tokio::test]
    async fn test_shared_tier_keeps_tie_and_pin_order() {
        let repo = Arc::new(InMemoryPostRepository::seeded(5));
        repo.update_type(5, PostType::Top).await.unwrap();
        repo.update_score(3, 4.0).await.unwrap();
        let shared = Arc::new(SharedListCache::in_memory());
        let loader = PostListLoader::new(repo.clone(), shared.clone());

        let from_store = loader.load(&"0:5".to_string()).await.unwrap();
        assert_eq!(ids(&from_store), vec![5, 1, 2, 3, 4]);

        let from_shared = loader.load(&"0:5".to_string()).await.unwrap();
        assert_eq!(from_shared, shared.read_ordered("0:5").await.unwrap());
        assert_eq!(ids(&from_shared), vec![5, 4, 2, 3, 1]);
    }

    #[tokio::test]
    async fn test_vanished_shared_page_falls_through_to_store() {
        let repo = Arc::new(InMemoryPostRepository::seeded(5));
        let shared = Arc::new(SharedListCache::new(Arc::new(VanishingBackend)));
        let loader = PostListLoader::new(repo.clone(), shared.clone());

        let rows = loader.load(&"0:3".to_string()).await.unwrap();
        assert_eq!(ids(&rows), vec![1, 2, 3]);
        assert_eq!(repo.stats().select_posts, 1);
        assert_eq!(shared.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_rows_loader_scopes_by_user() {
        let repo = Arc::new(InMemoryPostRepository::seeded(10));
        let loader = PostRowsLoader::new(repo);

        assert_eq!(loader.load(&0).await.unwrap(), 10);
        assert_eq!(loader.load(&2).await.unwrap(), 2);
    }
}
