//! Key-value cache consumed by the audit job.

mod memory_cache;
mod redis_cache;

pub use memory_cache::MemoryCache;
pub use redis_cache::RedisCache;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Read-side view of a cache whose entries expire on their own.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Keys matching a glob pattern (`*` any run, `?` any single character).
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Whether `key` is present and not expired.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
}
