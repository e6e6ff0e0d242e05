//! Blacklist expiry audit background job.
//!
//! Lists the cache keys under the pending-expiry prefix and checks each one
//! for existence. Keys that are listed but no longer exist have been expired
//! by the cache's own TTL. Every key is checked, in windows of `batch_size`,
//! and the tick reports one `drain.summary` carrying the expired count. The
//! job never writes to the cache.

use crate::background_jobs::{
    context::JobContext,
    drain::{drain_batch, log_summary, DrainSummary, DrainWorker, ItemError},
    job::{BackgroundJob, JobError},
};
use crate::cache::KeyValueCache;
use crate::config::BlacklistAuditJobSettings;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub const JOB_NAME: &str = "blacklist_audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Live,
    Expired,
}

/// Totals across every window of one audit run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub scanned: usize,
    pub expired: usize,
    pub live: usize,
    pub failed: usize,
}

pub struct BlacklistAuditJob {
    cache: Arc<dyn KeyValueCache>,
    key_prefix: String,
    batch_size: usize,
}

/// One bounded window of keys, drained as a single pass.
struct KeyWindow<'a> {
    cache: &'a dyn KeyValueCache,
    keys: &'a [String],
}

#[async_trait]
impl<'a> DrainWorker for KeyWindow<'a> {
    type Item = String;
    type Output = KeyState;

    fn item_id(&self, key: &String) -> String {
        key.clone()
    }

    async fn select(&self, limit: usize) -> Result<Vec<String>, JobError> {
        Ok(self.keys.iter().take(limit).cloned().collect())
    }

    async fn process(&self, key: &String) -> Result<KeyState, ItemError> {
        match self.cache.exists(key).await {
            Ok(true) => Ok(KeyState::Live),
            Ok(false) => Ok(KeyState::Expired),
            Err(e) => Err(ItemError::Store(e.to_string())),
        }
    }
}

impl BlacklistAuditJob {
    pub fn new(
        cache: Arc<dyn KeyValueCache>,
        key_prefix: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            cache,
            key_prefix: key_prefix.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_settings(settings: &BlacklistAuditJobSettings, cache: Arc<dyn KeyValueCache>) -> Self {
        Self::new(cache, settings.key_prefix.clone(), settings.batch_size)
    }

    fn pattern(&self) -> String {
        format!("{}*", self.key_prefix)
    }

    /// Audit every key under the prefix, `batch_size` keys per window.
    pub async fn audit(&self, ctx: &JobContext) -> Result<AuditReport, JobError> {
        let keys = self
            .cache
            .keys_matching(&self.pattern())
            .await
            .map_err(|e| JobError::ExecutionFailed(format!("Failed to list cache keys: {}", e)))?;

        let mut summary = DrainSummary::default();
        let mut report = AuditReport::default();

        for chunk in keys.chunks(self.batch_size) {
            if ctx.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            let window = KeyWindow {
                cache: self.cache.as_ref(),
                keys: chunk,
            };
            let pass = drain_batch(&window, self.batch_size, ctx).await?;
            summary.merge(&pass.summary);
            report.add(&pass.summary, &pass.outputs);

            if pass.summary.interrupted {
                break;
            }
        }

        self.log_tick(ctx, &summary, &report);
        if summary.interrupted {
            return Err(JobError::Cancelled);
        }
        Ok(report)
    }

    fn log_tick(&self, ctx: &JobContext, summary: &DrainSummary, report: &AuditReport) {
        if summary.is_idle() {
            log_summary(&ctx.job_name, summary);
            return;
        }
        info!(
            job = %ctx.job_name,
            prefix = %self.key_prefix,
            selected = summary.selected,
            processed = summary.processed,
            failed = summary.failed,
            expired = report.expired,
            live = report.live,
            "drain.summary"
        );
    }
}

impl AuditReport {
    fn add(&mut self, summary: &DrainSummary, states: &[KeyState]) {
        self.scanned += summary.processed + summary.failed;
        self.failed += summary.failed;
        for state in states {
            match state {
                KeyState::Live => self.live += 1,
                KeyState::Expired => self.expired += 1,
            }
        }
    }
}

#[async_trait]
impl BackgroundJob for BlacklistAuditJob {
    fn description(&self) -> &'static str {
        "Count blacklist cache entries that have expired since the last pass"
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        self.audit(ctx).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryCache};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> JobContext {
        JobContext::new(JOB_NAME, CancellationToken::new())
    }

    /// Cache whose existence check fails for one key and whose listing can fail.
    struct FlakyCache {
        keys: Vec<String>,
        broken_key: Option<String>,
        listing_fails: bool,
    }

    #[async_trait]
    impl KeyValueCache for FlakyCache {
        async fn keys_matching(&self, _pattern: &str) -> Result<Vec<String>, CacheError> {
            if self.listing_fails {
                return Err(CacheError::Unavailable("connection refused".to_string()));
            }
            Ok(self.keys.clone())
        }

        async fn exists(&self, key: &str) -> Result<bool, CacheError> {
            if self.broken_key.as_deref() == Some(key) {
                return Err(CacheError::Unavailable("timeout".to_string()));
            }
            Ok(!key.ends_with("gone"))
        }
    }

    #[test]
    fn test_job_metadata() {
        let job = BlacklistAuditJob::from_settings(
            &BlacklistAuditJobSettings::default(),
            Arc::new(MemoryCache::new()),
        );

        assert_eq!(job.pattern(), "blacklist:pending:*");
        assert_eq!(job.batch_size, 100);
        assert!(!job.description().is_empty());
    }

    #[tokio::test]
    async fn test_counts_expired_keys() {
        let cache = Arc::new(MemoryCache::new());
        for i in 0..5 {
            cache.set_with_ttl(format!("blacklist:pending:live{}", i), "1", Duration::from_secs(60));
        }
        for i in 0..3 {
            cache.set_with_ttl(
                format!("blacklist:pending:old{}", i),
                "1",
                Duration::from_millis(5),
            );
        }
        cache.set("session:unrelated", "1");
        tokio::time::sleep(Duration::from_millis(30)).await;

        let job = BlacklistAuditJob::new(cache.clone(), "blacklist:pending:", 100);
        let report = job.audit(&ctx()).await.unwrap();

        assert_eq!(report.scanned, 8);
        assert_eq!(report.expired, 3);
        assert_eq!(report.live, 5);

        // Expired entries were evicted by the cache on lookup; the next pass
        // only sees what expired since.
        let report = job.audit(&ctx()).await.unwrap();
        assert_eq!(report.expired, 0);
        assert_eq!(report.live, 5);
    }

    #[tokio::test]
    async fn test_windows_cover_every_key() {
        let keys: Vec<String> = (0..25)
            .map(|i| {
                if i % 5 == 0 {
                    format!("k{}gone", i)
                } else {
                    format!("k{}", i)
                }
            })
            .collect();
        let cache = Arc::new(FlakyCache {
            keys,
            broken_key: None,
            listing_fails: false,
        });
        let job = BlacklistAuditJob::new(cache, "k", 10);

        let report = job.audit(&ctx()).await.unwrap();

        assert_eq!(report.scanned, 25);
        assert_eq!(report.expired, 5);
        assert_eq!(report.live, 20);
    }

    #[tokio::test]
    async fn test_failed_check_does_not_abort_scan() {
        let cache = Arc::new(FlakyCache {
            keys: vec!["a".into(), "bgone".into(), "c".into(), "dgone".into()],
            broken_key: Some("c".to_string()),
            listing_fails: false,
        });
        let job = BlacklistAuditJob::new(cache, "", 100);

        let report = job.audit(&ctx()).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.expired, 2);
        assert_eq!(report.live, 1);
    }

    #[tokio::test]
    async fn test_listing_failure_fails_run() {
        let cache = Arc::new(FlakyCache {
            keys: vec![],
            broken_key: None,
            listing_fails: true,
        });
        let job = BlacklistAuditJob::new(cache, "blacklist:pending:", 100);

        assert!(matches!(
            job.execute(&ctx()).await,
            Err(JobError::ExecutionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_audit_never_mutates_live_entries() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("blacklist:pending:a", "1");
        cache.set("blacklist:pending:b", "1");
        let job = BlacklistAuditJob::new(cache.clone(), "blacklist:pending:", 100);

        let report = job.audit(&ctx()).await.unwrap();

        assert_eq!(report.expired, 0);
        assert_eq!(report.live, 2);
        assert!(cache.get("blacklist:pending:a").is_some());
        assert!(cache.get("blacklist:pending:b").is_some());
    }
}
