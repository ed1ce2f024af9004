//! Redis-backed shared store
//!
//! Maps the store contract onto plain Redis commands:
//! - frontier, visited set and image results are Redis sets
//!   (`SADD`, `SPOP`, `SCARD`, `SMEMBERS`)
//! - the active-worker counter is a string key (`INCR`, `DECR`, `GET`)
//!
//! Every worker gets a clone of one multiplexed connection, so each call
//! is a single round-trip and Redis provides the per-command atomicity.

use crate::store::traits::{SharedStore, StoreError, StoreKeys, StoreResult};

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};

/// Redis implementation of [`SharedStore`]
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    keys: StoreKeys,
}

impl RedisStore {
    /// Connects to Redis at `url` using the given key names
    pub async fn connect(url: &str, keys: StoreKeys) -> StoreResult<Self> {
        let client = Client::open(url).map_err(|e| StoreError::Connection {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Connected to shared store at {}", url);

        Ok(Self { connection, keys })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn enqueue_seed(&self, url: &str) -> StoreResult<()> {
        let mut conn = self.conn();
        conn.sadd::<_, _, i64>(&self.keys.frontier, url).await?;
        Ok(())
    }

    async fn claim_next(&self) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        let url: Option<String> = conn.spop(&self.keys.frontier).await?;
        Ok(url)
    }

    async fn frontier_size(&self) -> StoreResult<u64> {
        let mut conn = self.conn();
        let size: u64 = conn.scard(&self.keys.frontier).await?;
        Ok(size)
    }

    async fn enqueue_links(&self, urls: &[String]) -> StoreResult<()> {
        // SADD with no members is a syntax error
        if urls.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        conn.sadd::<_, _, i64>(&self.keys.frontier, urls).await?;
        Ok(())
    }

    async fn mark_visited(&self, url: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        let inserted: i64 = conn.sadd(&self.keys.visited, url).await?;
        Ok(inserted == 1)
    }

    async fn incr_active(&self) -> StoreResult<i64> {
        let mut conn = self.conn();
        let active: i64 = conn.incr(&self.keys.active_workers, 1).await?;
        Ok(active)
    }

    async fn decr_active(&self) -> StoreResult<i64> {
        let mut conn = self.conn();
        let active: i64 = conn.decr(&self.keys.active_workers, 1).await?;
        Ok(active)
    }

    async fn get_active(&self) -> StoreResult<i64> {
        let mut conn = self.conn();
        let active: Option<i64> = conn.get(&self.keys.active_workers).await?;
        Ok(active.unwrap_or(0))
    }

    async fn add_image_results(&self, urls: &[String]) -> StoreResult<()> {
        if urls.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        conn.sadd::<_, _, i64>(&self.keys.image_srcs, urls).await?;
        Ok(())
    }

    async fn visited(&self) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        let urls: Vec<String> = conn.smembers(&self.keys.visited).await?;
        Ok(urls)
    }

    async fn image_results(&self) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        let urls: Vec<String> = conn.smembers(&self.keys.image_srcs).await?;
        Ok(urls)
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut conn = self.conn();
        let keys = self.keys.all();
        conn.del::<_, i64>(&keys[..]).await?;
        Ok(())
    }
}
