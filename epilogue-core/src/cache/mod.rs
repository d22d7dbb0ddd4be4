//! Response memoization and read-path invalidation.
//!
//! The cache is external and shared; the core is strict about exactly one
//! invariant: after a production write for actor A, every cached read-path
//! entry derivable from A is invalidated before the write returns.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

pub use memory::MemoryCache;
pub use redis::RedisCache;

/// Keyed get/set with TTL over opaque string keys and JSON string values.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    async fn invalidate(&self, keys: &[String]) -> Result<()>;

    /// Glob-style pattern invalidation (`actor:list:*`).
    async fn invalidate_pattern(&self, pattern: &str) -> Result<()>;
}

/// Typed read through the trait object.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Typed write through the trait object.
pub async fn set_json<T: Serialize>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, raw, ttl).await
}

/// The documented key templates. The writer invalidates the two actor keys
/// plus the list pattern after every production write.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeys;

impl CacheKeys {
    pub fn actor_profile(actor_id: i64) -> String {
        format!("actor:id:{actor_id}")
    }

    pub fn actor_death(actor_id: i64) -> String {
        format!("actor:id:{actor_id}:type:death")
    }

    pub fn actor_list_pattern() -> String {
        "actor:list:*".to_string()
    }

    /// Per-source lookup memoization, keyed by source and actor identity.
    pub fn lookup(source: epilogue_model::SourceType, actor_id: i64) -> String {
        format!("lookup:{}:{}", source.as_str(), actor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epilogue_model::SourceType;

    #[test]
    fn key_templates_are_stable() {
        assert_eq!(CacheKeys::actor_profile(42), "actor:id:42");
        assert_eq!(CacheKeys::actor_death(42), "actor:id:42:type:death");
        assert_eq!(CacheKeys::actor_list_pattern(), "actor:list:*");
        assert_eq!(
            CacheKeys::lookup(SourceType::Wikidata, 42),
            "lookup:wikidata:42"
        );
    }
}
