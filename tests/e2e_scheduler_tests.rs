//! End-to-end tests for the job scheduler running the real jobs
//!
//! Covers job-level isolation: a job whose queue is unavailable keeps failing
//! on every tick while the scheduler and every other job keep running.

mod common;

use cadence_worker::background_jobs::jobs::{NotificationDispatchJob, PaymentWebhookJob};
use cadence_worker::background_jobs::{JobSchedule, JobScheduler};
use cadence_worker::notification_queue::NotificationStatus;
use common::{wait_until, LogCapture, RecordingAdapter, TestQueue, UnavailableQueue};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_failing_job_does_not_stop_the_scheduler() {
    let logs = LogCapture::install();
    let broken = Arc::new(UnavailableQueue::default());
    let healthy = TestQueue::new();
    let adapter = RecordingAdapter::new();

    let mut scheduler = JobScheduler::new(Duration::from_secs(1));
    scheduler
        .register(
            "broken_dispatch",
            JobSchedule::Interval(Duration::from_millis(40)),
            Arc::new(NotificationDispatchJob::new(broken.clone(), adapter.clone(), 100, 10)),
        )
        .unwrap();
    scheduler
        .register(
            "healthy_dispatch",
            JobSchedule::Interval(Duration::from_millis(40)),
            Arc::new(NotificationDispatchJob::new(healthy.store(), adapter.clone(), 100, 10)),
        )
        .unwrap();
    scheduler
        .register(
            "payment_webhook",
            JobSchedule::Interval(Duration::from_millis(40)),
            Arc::new(PaymentWebhookJob::new()),
        )
        .unwrap();
    let handle = scheduler.start().unwrap();

    assert!(
        wait_until(Duration::from_secs(2), || broken.query_count() >= 3).await,
        "failing job should keep firing on every tick"
    );

    // Work enqueued after the failures still gets delivered.
    let id = healthy.enqueue_due("late", 10);
    assert!(
        wait_until(Duration::from_secs(2), || {
            healthy.status_of(&id) == NotificationStatus::Sent
        })
        .await
    );

    assert!(scheduler.is_running());
    assert!(handle.job_exists("broken_dispatch").await);
    scheduler.stop().await.unwrap();

    let broken_failures = logs
        .named("job.failure")
        .iter()
        .filter(|e| e.field("job") == Some("broken_dispatch"))
        .count();
    assert!(broken_failures >= 3);
    assert!(logs
        .named("job.success")
        .iter()
        .any(|e| e.field("job") == Some("payment_webhook")));
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn test_manual_trigger_runs_dispatch_immediately() {
    let queue = TestQueue::new();
    let id = queue.enqueue_due("now", 10);
    let adapter = RecordingAdapter::new();

    let mut scheduler = JobScheduler::new(Duration::from_secs(1));
    scheduler
        .register(
            "dispatch",
            JobSchedule::Interval(Duration::from_secs(3600)),
            Arc::new(NotificationDispatchJob::new(queue.store(), adapter.clone(), 100, 10)),
        )
        .unwrap();
    let handle = scheduler.start().unwrap();

    handle.trigger_job("dispatch").await.unwrap();
    assert!(
        wait_until(Duration::from_secs(2), || {
            queue.status_of(&id) == NotificationStatus::Sent
        })
        .await
    );
    assert_eq!(adapter.call_count(), 1);

    scheduler.stop().await.unwrap();
}
