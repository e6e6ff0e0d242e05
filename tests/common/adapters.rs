//! Delivery adapter test double.

use async_trait::async_trait;
use cadence_worker::delivery::{DeliveryAdapter, DeliveryError};
use cadence_worker::notification_queue::QueuedNotification;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Records every notification it is handed, in call order, and rejects the
/// ones addressed to a configured set of recipients.
#[derive(Default)]
pub struct RecordingAdapter {
    rejected_recipients: Mutex<HashSet<String>>,
    delivered: Mutex<Vec<QueuedNotification>>,
}

#[allow(dead_code)]
impl RecordingAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(recipients: &[&str]) -> Arc<Self> {
        let adapter = Self::default();
        adapter
            .rejected_recipients
            .lock()
            .unwrap()
            .extend(recipients.iter().map(|r| r.to_string()));
        Arc::new(adapter)
    }

    /// Ids of every notification handed over, including rejected ones.
    pub fn calls(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliveryAdapter for RecordingAdapter {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, notification: &QueuedNotification) -> Result<(), DeliveryError> {
        self.delivered.lock().unwrap().push(notification.clone());
        if self
            .rejected_recipients
            .lock()
            .unwrap()
            .contains(&notification.recipient)
        {
            return Err(DeliveryError::Rejected(format!(
                "{} does not accept notifications",
                notification.recipient
            )));
        }
        Ok(())
    }
}
