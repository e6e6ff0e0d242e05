//! Shared fixtures for end-to-end tests.

use cadence_worker::background_jobs::JobContext;
use cadence_worker::notification_queue::{
    now_millis, NotificationQueueStore, NotificationStatus, QueueFilter, QueuedNotification,
    SqliteNotificationQueueStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// A notification queue backed by a SQLite file in a temporary directory.
///
/// The directory lives as long as the fixture.
pub struct TestQueue {
    pub store: Arc<SqliteNotificationQueueStore>,
    _dir: TempDir,
}

#[allow(dead_code)]
impl TestQueue {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteNotificationQueueStore::new(dir.path().join("notifications.db"))
            .expect("Failed to open notification queue");
        Self {
            store: Arc::new(store),
            _dir: dir,
        }
    }

    pub fn store(&self) -> Arc<dyn NotificationQueueStore> {
        self.store.clone()
    }

    /// Enqueue an item that became due `age_ms` milliseconds ago.
    pub fn enqueue_due(&self, recipient: &str, age_ms: i64) -> String {
        self.enqueue_at(recipient, now_millis() - age_ms)
    }

    pub fn enqueue_at(&self, recipient: &str, scheduled_for: i64) -> String {
        let item = QueuedNotification::new(
            recipient,
            "email",
            json!({ "subject": format!("hello {}", recipient) }),
            scheduled_for,
        );
        self.store.enqueue(&item).expect("Failed to enqueue");
        item.id
    }

    pub fn status_of(&self, id: &str) -> NotificationStatus {
        self.store
            .get(id)
            .expect("Failed to read item")
            .expect("Item missing")
            .status
    }

    pub fn count_with_status(&self, status: NotificationStatus) -> usize {
        self.store
            .count(&QueueFilter::with_status(status))
            .expect("Failed to count items")
    }

    /// Every stored item, oldest scheduled first.
    pub fn snapshot(&self) -> Vec<QueuedNotification> {
        self.store
            .query(&QueueFilter::default(), 10_000)
            .expect("Failed to query items")
    }
}

pub fn job_context(job_name: &str) -> JobContext {
    JobContext::new(job_name, CancellationToken::new())
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
