//! Notification queue: the backing store drained by the dispatch job.

mod models;
mod schema;
mod sqlite_queue_store;

pub use models::{now_millis, NotificationStatus, QueuedNotification};
pub use sqlite_queue_store::SqliteNotificationQueueStore;

/// Selection filter. Every field that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueFilter {
    pub status: Option<NotificationStatus>,
    /// Matches items with `scheduled_for <= scheduled_before`.
    pub scheduled_before: Option<i64>,
}

impl QueueFilter {
    /// Pending items that are due at `now`.
    pub fn due(now: i64) -> Self {
        Self {
            status: Some(NotificationStatus::Pending),
            scheduled_before: Some(now),
        }
    }

    pub fn with_status(status: NotificationStatus) -> Self {
        Self {
            status: Some(status),
            scheduled_before: None,
        }
    }
}

/// Fields to change on one item. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueItemUpdate {
    pub status: Option<NotificationStatus>,
    pub sent_at: Option<i64>,
    pub last_error: Option<String>,
}

impl QueueItemUpdate {
    pub fn mark_sent(at: i64) -> Self {
        Self {
            status: Some(NotificationStatus::Sent),
            sent_at: Some(at),
            last_error: None,
        }
    }

    pub fn mark_failed(reason: impl Into<String>) -> Self {
        Self {
            status: Some(NotificationStatus::Failed),
            sent_at: None,
            last_error: Some(reason.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueStoreError {
    #[error("notification {0} not found")]
    NotFound(String),
    #[error("notification {id} is already {status} and cannot change")]
    TerminalStatus { id: String, status: &'static str },
    #[error("corrupt row for notification {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

/// Storage operations for queued notifications.
pub trait NotificationQueueStore: Send + Sync {
    /// Add a new item to the queue.
    fn enqueue(&self, item: &QueuedNotification) -> Result<(), QueueStoreError>;

    /// Get an item by id.
    fn get(&self, id: &str) -> Result<Option<QueuedNotification>, QueueStoreError>;

    /// Items matching `filter`, oldest scheduled first (creation time, then id,
    /// breaking ties), at most `limit` of them.
    fn query(
        &self,
        filter: &QueueFilter,
        limit: usize,
    ) -> Result<Vec<QueuedNotification>, QueueStoreError>;

    /// Apply `update` to one item. Terminal items never change.
    fn update(&self, id: &str, update: &QueueItemUpdate) -> Result<(), QueueStoreError>;

    /// Count a failed delivery attempt on a pending item, returning the new
    /// attempt count. The status is left unchanged.
    fn record_failed_attempt(&self, id: &str, reason: &str) -> Result<u32, QueueStoreError>;

    /// Number of items matching `filter`.
    fn count(&self, filter: &QueueFilter) -> Result<usize, QueueStoreError>;
}
