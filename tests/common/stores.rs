//! Store test doubles.

use cadence_worker::notification_queue::{
    NotificationQueueStore, QueueFilter, QueueItemUpdate, QueueStoreError, QueuedNotification,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Queue whose every call fails, counting selection attempts.
#[derive(Default)]
pub struct UnavailableQueue {
    queries: AtomicUsize,
}

#[allow(dead_code)]
impl UnavailableQueue {
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn down() -> QueueStoreError {
        QueueStoreError::Corrupt {
            id: "*".to_string(),
            reason: "database is locked".to_string(),
        }
    }
}

impl NotificationQueueStore for UnavailableQueue {
    fn enqueue(&self, _item: &QueuedNotification) -> Result<(), QueueStoreError> {
        Err(Self::down())
    }

    fn get(&self, _id: &str) -> Result<Option<QueuedNotification>, QueueStoreError> {
        Err(Self::down())
    }

    fn query(
        &self,
        _filter: &QueueFilter,
        _limit: usize,
    ) -> Result<Vec<QueuedNotification>, QueueStoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Err(Self::down())
    }

    fn update(&self, _id: &str, _update: &QueueItemUpdate) -> Result<(), QueueStoreError> {
        Err(Self::down())
    }

    fn record_failed_attempt(&self, _id: &str, _reason: &str) -> Result<u32, QueueStoreError> {
        Err(Self::down())
    }

    fn count(&self, _filter: &QueueFilter) -> Result<usize, QueueStoreError> {
        Err(Self::down())
    }
}
