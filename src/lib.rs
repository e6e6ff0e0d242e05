//! Cadence Worker Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod background_jobs;
pub mod cache;
pub mod config;
pub mod delivery;
pub mod metrics;
pub mod notification_queue;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use background_jobs::{JobScheduler, SchedulerHandle};
pub use cache::{KeyValueCache, MemoryCache};
pub use delivery::{DeliveryAdapter, LogDeliveryAdapter, WebhookDeliveryAdapter};
pub use notification_queue::{NotificationQueueStore, SqliteNotificationQueueStore};
