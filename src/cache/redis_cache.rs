//! Redis-backed cache, read through a shared `ConnectionManager`.

use super::{CacheError, KeyValueCache};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Keys requested per SCAN round trip.
const SCAN_COUNT: usize = 1000;

pub struct RedisCache {
    conn: ConnectionManager,
}

fn unavailable(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

impl RedisCache {
    /// Connect and check the server answers PING.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        info!("Connecting to Redis at {}", url);
        let client = redis::Client::open(url).map_err(unavailable)?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(unavailable)?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        // SCAN may return a key more than once across pages.
        let mut keys = BTreeSet::new();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, page): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;

            keys.extend(page);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        debug!("SCAN {} matched {} keys", pattern, keys.len());
        Ok(keys.into_iter().collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(count > 0)
    }
}
