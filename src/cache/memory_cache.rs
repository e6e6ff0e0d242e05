//! In-process cache with per-entry TTL. Stands in for Redis in tests.
//!
//! Expiry is lazy: an expired entry stays listed by `keys_matching` until it
//! is looked up, at which point it is evicted.

use super::{CacheError, KeyValueCache};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` without expiry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key.into(), value.into(), None);
    }

    /// Store `value`, expiring after `ttl`.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        self.insert(key.into(), value.into(), Some(Instant::now() + ttl));
    }

    fn insert(&self, key: String, value: String, expires_at: Option<Instant>) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key, Entry { value, expires_at });
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }
}

/// Translate a glob pattern into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, CacheError> {
    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| CacheError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let matcher = glob_to_regex(pattern)?;
        let entries = self.entries.lock().unwrap();
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| matcher.is_match(k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_translation() {
        let re = glob_to_regex("blacklist:pending:*").unwrap();
        assert!(re.is_match("blacklist:pending:abc"));
        assert!(re.is_match("blacklist:pending:"));
        assert!(!re.is_match("blacklist:active:abc"));
        assert!(!re.is_match("xblacklist:pending:abc"));

        let re = glob_to_regex("token.?").unwrap();
        assert!(re.is_match("token.1"));
        assert!(!re.is_match("tokenx1"));
    }

    #[tokio::test]
    async fn test_keys_matching_is_sorted_and_filtered() {
        let cache = MemoryCache::new();
        cache.set("session:b", "2");
        cache.set("session:a", "1");
        cache.set("other:c", "3");

        let keys = cache.keys_matching("session:*").await.unwrap();
        assert_eq!(keys, vec!["session:a".to_string(), "session:b".to_string()]);
    }

    #[tokio::test]
    async fn test_expired_entry_is_listed_until_checked() {
        let cache = MemoryCache::new();
        cache.set_with_ttl("k:short", "v", Duration::from_millis(10));
        cache.set_with_ttl("k:long", "v", Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.keys_matching("k:*").await.unwrap().len(), 2);
        assert!(!cache.exists("k:short").await.unwrap());
        assert!(cache.exists("k:long").await.unwrap());
        assert_eq!(cache.keys_matching("k:*").await.unwrap(), vec!["k:long".to_string()]);
    }
}
