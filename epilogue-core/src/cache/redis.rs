use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

use crate::error::{EnrichError, Result};

use super::Cache;

/// Redis-backed cache over a multiplexed connection manager.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis cache at {}", redis_url);

        let client = redis::Client::open(redis_url)
            .map_err(|e| EnrichError::CacheUnavailable(format!("failed to create client: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| EnrichError::CacheUnavailable(format!("failed to connect: {e}")))?;

        info!("Successfully connected to Redis cache");

        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| EnrichError::CacheUnavailable(format!("GET failed: {e}")))?;

        match &data {
            Some(_) => debug!("Cache HIT: {}", key),
            None => debug!("Cache MISS: {}", key),
        }
        Ok(data)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        debug!("Cache SET: {} (TTL: {:?})", key, ttl);
        let mut conn = self.conn.clone();

        if let Some(ttl) = ttl {
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
                .await
                .map_err(|e| EnrichError::CacheUnavailable(format!("SETEX failed: {e}")))?;
        } else {
            conn.set::<_, _, ()>(key, value)
                .await
                .map_err(|e| EnrichError::CacheUnavailable(format!("SET failed: {e}")))?;
        }

        Ok(())
    }

    async fn invalidate(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        debug!("Cache DELETE: {:?}", keys);
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys)
            .await
            .map_err(|e| EnrichError::CacheUnavailable(format!("DEL failed: {e}")))?;
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<()> {
        debug!("Cache DELETE pattern: {}", pattern);
        let mut conn = self.conn.clone();

        let keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| EnrichError::CacheUnavailable(format!("KEYS failed: {e}")))?;

        if !keys.is_empty() {
            debug!("Deleting {} keys matching pattern: {}", keys.len(), pattern);
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| EnrichError::CacheUnavailable(format!("DEL failed: {e}")))?;
        }

        Ok(())
    }
}
