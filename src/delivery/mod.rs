//! Delivery adapters: hand one notification to the outside world.

mod log_adapter;
mod webhook_adapter;

pub use log_adapter::LogDeliveryAdapter;
pub use webhook_adapter::WebhookDeliveryAdapter;

use crate::notification_queue::QueuedNotification;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The receiving side refused the notification.
    #[error("delivery rejected: {0}")]
    Rejected(String),
    /// The notification never reached the receiving side.
    #[error("delivery transport error: {0}")]
    Transport(String),
    #[error("delivery timed out")]
    Timeout,
}

/// Accepts one notification: success, or failure with a reason.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, notification: &QueuedNotification) -> Result<(), DeliveryError>;
}
