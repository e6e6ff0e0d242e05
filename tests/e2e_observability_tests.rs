//! End-to-end tests for the structured log events jobs emit
//!
//! Every run is wrapped by `run_job`, which reports `job.start` and then one
//! of `job.success` or `job.failure`. Drain-style jobs report one
//! `drain.summary` per tick, or `drain.idle` when nothing was selected.

mod common;

use cadence_worker::background_jobs::jobs::{
    blacklist_audit, notification_dispatch, BlacklistAuditJob, NotificationDispatchJob,
    PaymentWebhookJob,
};
use cadence_worker::background_jobs::{run_job, JobOutcome};
use cadence_worker::cache::MemoryCache;
use cadence_worker::notification_queue::{now_millis, NotificationStatus};
use common::{job_context, LogCapture, RecordingAdapter, TestQueue, UnavailableQueue};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_idle_dispatch_ticks_log_idle_only() {
    let logs = LogCapture::install();
    let queue = TestQueue::new();
    queue.enqueue_at("later", now_millis() + 3_600_000);
    let before = queue.snapshot();
    let job = Arc::new(NotificationDispatchJob::new(
        queue.store(),
        RecordingAdapter::new(),
        100,
        10,
    ));

    for _ in 0..2 {
        let run = run_job(job.clone(), job_context(notification_dispatch::JOB_NAME)).await;
        assert!(run.is_success());
    }

    assert_eq!(logs.count("drain.idle"), 2);
    assert_eq!(logs.count("drain.summary"), 0);
    assert_eq!(logs.count("job.success"), 2);
    for event in logs.named("drain.idle") {
        assert_eq!(event.field("job"), Some(notification_dispatch::JOB_NAME));
    }
    assert_eq!(queue.snapshot(), before);
}

#[tokio::test]
async fn test_wrapped_success_logs_start_then_success() {
    let logs = LogCapture::install();

    let run = run_job(Arc::new(PaymentWebhookJob::new()), job_context("payment_webhook")).await;

    assert_eq!(run.outcome, JobOutcome::Success);
    assert_eq!(logs.lifecycle(), vec!["job.start", "job.success"]);
    let success = &logs.named("job.success")[0];
    assert_eq!(success.field("job"), Some("payment_webhook"));
    assert!(success.field("duration_ms").is_some());
    assert_eq!(logs.count("job.failure"), 0);
}

#[tokio::test]
async fn test_wrapped_failure_logs_start_then_failure_with_error() {
    let logs = LogCapture::install();
    let job = NotificationDispatchJob::new(
        Arc::new(UnavailableQueue::default()),
        RecordingAdapter::new(),
        100,
        10,
    );

    let run = run_job(Arc::new(job), job_context(notification_dispatch::JOB_NAME)).await;

    assert_eq!(run.outcome, JobOutcome::Failure);
    assert_eq!(logs.lifecycle(), vec!["job.start", "job.failure"]);
    let failure = &logs.named("job.failure")[0];
    assert_eq!(failure.field("job"), Some(notification_dispatch::JOB_NAME));
    assert!(failure.field("duration_ms").is_some());
    assert!(failure
        .field("error")
        .is_some_and(|e| e.contains("database is locked")));
    assert_eq!(logs.count("job.success"), 0);
}

#[tokio::test]
async fn test_dispatch_tick_logs_one_summary() {
    let logs = LogCapture::install();
    let queue = TestQueue::new();
    for i in 0..3 {
        queue.enqueue_due(&format!("user-{}", i), 10 + i);
    }
    let job = NotificationDispatchJob::new(queue.store(), RecordingAdapter::new(), 100, 10);

    let run = run_job(Arc::new(job), job_context(notification_dispatch::JOB_NAME)).await;

    assert!(run.is_success());
    assert_eq!(
        logs.lifecycle(),
        vec!["job.start", "drain.summary", "job.success"]
    );
    let summary = &logs.named("drain.summary")[0];
    assert_eq!(summary.field("selected"), Some("3"));
    assert_eq!(summary.field("processed"), Some("3"));
    assert_eq!(summary.field("failed"), Some("0"));
    assert_eq!(queue.count_with_status(NotificationStatus::Sent), 3);
}

#[tokio::test]
async fn test_audit_tick_over_several_windows_logs_one_summary() {
    let logs = LogCapture::install();
    let prefix = "blacklist:pending:";
    let cache = Arc::new(MemoryCache::new());
    for i in 0..210 {
        cache.set_with_ttl(format!("{}live-{}", prefix, i), "1", Duration::from_secs(600));
    }
    for i in 0..40 {
        cache.set_with_ttl(format!("{}old-{}", prefix, i), "1", Duration::from_millis(5));
    }
    tokio::time::sleep(Duration::from_millis(30)).await;
    let job = BlacklistAuditJob::new(cache, prefix, 100);

    let run = run_job(Arc::new(job), job_context(blacklist_audit::JOB_NAME)).await;

    assert!(run.is_success());
    assert_eq!(
        logs.lifecycle(),
        vec!["job.start", "drain.summary", "job.success"]
    );
    let summary = &logs.named("drain.summary")[0];
    assert_eq!(summary.field("job"), Some(blacklist_audit::JOB_NAME));
    assert_eq!(summary.field("selected"), Some("250"));
    assert_eq!(summary.field("processed"), Some("250"));
    assert_eq!(summary.field("expired"), Some("40"));
    assert_eq!(summary.field("live"), Some("210"));
}

#[tokio::test]
async fn test_empty_audit_tick_logs_idle() {
    let logs = LogCapture::install();
    let job = BlacklistAuditJob::new(Arc::new(MemoryCache::new()), "blacklist:pending:", 100);

    let run = run_job(Arc::new(job), job_context(blacklist_audit::JOB_NAME)).await;

    assert!(run.is_success());
    assert_eq!(logs.lifecycle(), vec!["job.start", "drain.idle", "job.success"]);
}
