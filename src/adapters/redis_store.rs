//! Redis Shared Backend
//!
//! [`SortedSetBackend`] over Redis sorted sets. A page batch is written as a
//! `MULTI`/`EXEC` pipeline of `ZADD`s so readers see all members or none.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::cache::{ScoredMember, SortedSetBackend};
use crate::error::{Error, Result};

/// Redis-backed ordered store
#[derive(Clone)]
pub struct RedisSortedSetBackend {
    conn: ConnectionManager,
}

impl RedisSortedSetBackend {
    /// Connect to the Redis server at `url`
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to shared cache at {}", url);
        Ok(Self { conn })
    }
}

#[async_trait]
impl SortedSetBackend for RedisSortedSetBackend {
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let present: bool = conn.exists(key).await?;
        Ok(present)
    }

    async fn range_all(&self, key: &str) -> Result<Vec<ScoredMember>> {
        let mut conn = self.conn.clone();
        let members: Vec<(String, f64)> = conn.zrange_withscores(key, 0, -1).await?;
        Ok(members)
    }

    async fn add_all(&self, key: &str, members: Vec<ScoredMember>) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (member, score) in &members {
            pipe.zadd(key, member, *score).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::SharedWrite {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
