//! Notification dispatch background job.
//!
//! Drains due notifications from the queue and hands each one to the
//! delivery adapter. Delivered items are marked sent. An item whose delivery
//! fails stays pending and is retried on the next tick, until it has failed
//! `max_attempts` times and is dead-lettered.

use crate::background_jobs::{
    context::JobContext,
    drain::{drain_pass, DrainWorker, ItemError},
    job::{BackgroundJob, JobError},
};
use crate::config::NotificationDispatchJobSettings;
use crate::delivery::DeliveryAdapter;
use crate::metrics;
use crate::notification_queue::{
    now_millis, NotificationQueueStore, QueueFilter, QueueItemUpdate, QueuedNotification,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

pub const JOB_NAME: &str = "notification_dispatch";

pub struct NotificationDispatchJob {
    store: Arc<dyn NotificationQueueStore>,
    adapter: Arc<dyn DeliveryAdapter>,
    batch_size: usize,
    max_attempts: u32,
}

impl NotificationDispatchJob {
    pub fn new(
        store: Arc<dyn NotificationQueueStore>,
        adapter: Arc<dyn DeliveryAdapter>,
        batch_size: usize,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            adapter,
            batch_size,
            max_attempts,
        }
    }

    pub fn from_settings(
        settings: &NotificationDispatchJobSettings,
        store: Arc<dyn NotificationQueueStore>,
        adapter: Arc<dyn DeliveryAdapter>,
    ) -> Self {
        Self::new(store, adapter, settings.batch_size, settings.max_attempts)
    }

    /// Count a failed delivery and dead-letter the item once it has used up
    /// its attempts.
    fn handle_delivery_failure(
        &self,
        item: &QueuedNotification,
        reason: String,
    ) -> Result<(), ItemError> {
        let attempts = self
            .store
            .record_failed_attempt(&item.id, &reason)
            .map_err(|e| ItemError::Store(e.to_string()))?;

        if self.max_attempts == 0 || attempts < self.max_attempts {
            return Err(ItemError::Rejected(reason));
        }

        self.store
            .update(&item.id, &QueueItemUpdate::mark_failed(reason.clone()))
            .map_err(|e| ItemError::Store(e.to_string()))?;
        metrics::record_notification_dead_lettered();
        error!(
            job = JOB_NAME,
            item_id = %item.id,
            recipient = %item.recipient,
            attempts,
            "Notification dead-lettered after exhausting delivery attempts: {}",
            reason
        );

        Err(ItemError::DeadLettered { attempts, reason })
    }
}

#[async_trait]
impl DrainWorker for NotificationDispatchJob {
    type Item = QueuedNotification;
    type Output = ();

    fn item_id(&self, item: &QueuedNotification) -> String {
        item.id.clone()
    }

    async fn select(&self, limit: usize) -> Result<Vec<QueuedNotification>, JobError> {
        self.store
            .query(&QueueFilter::due(now_millis()), limit)
            .map_err(|e| JobError::ExecutionFailed(format!("Failed to query due notifications: {}", e)))
    }

    async fn process(&self, item: &QueuedNotification) -> Result<(), ItemError> {
        if let Err(e) = self.adapter.send(item).await {
            return self.handle_delivery_failure(item, e.to_string());
        }

        self.store
            .update(&item.id, &QueueItemUpdate::mark_sent(now_millis()))
            .map_err(|e| {
                // Delivered but not recorded; the next tick will send it again.
                ItemError::Store(format!("delivered but failed to mark sent: {}", e))
            })
    }
}

#[async_trait]
impl BackgroundJob for NotificationDispatchJob {
    fn description(&self) -> &'static str {
        "Deliver due pending notifications through the delivery adapter"
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let pass = drain_pass(self, self.batch_size, ctx).await?;
        if pass.summary.interrupted {
            warn!(
                job = JOB_NAME,
                "Dispatch interrupted, {} notifications left for the next run",
                pass.summary.untouched()
            );
            return Err(JobError::Cancelled);
        }
        Ok(())
    }
}
