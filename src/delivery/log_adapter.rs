use super::{DeliveryAdapter, DeliveryError};
use crate::notification_queue::QueuedNotification;
use async_trait::async_trait;
use tracing::info;

/// Adapter that "delivers" by writing a log line. Used when no webhook is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDeliveryAdapter;

#[async_trait]
impl DeliveryAdapter for LogDeliveryAdapter {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &QueuedNotification) -> Result<(), DeliveryError> {
        info!(
            id = %notification.id,
            recipient = %notification.recipient,
            channel = %notification.channel,
            "Delivering notification: {}",
            notification.payload
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_log_adapter_always_succeeds() {
        let adapter = LogDeliveryAdapter;
        let n = QueuedNotification::due_now("user-1", "email", json!({"subject": "hello"}));

        assert!(adapter.send(&n).await.is_ok());
        assert_eq!(adapter.name(), "log");
    }
}
