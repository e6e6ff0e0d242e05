//! HTTP webhook delivery.

use super::{DeliveryAdapter, DeliveryError};
use crate::notification_queue::QueuedNotification;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Body POSTed to the webhook for each notification.
#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    id: &'a str,
    recipient: &'a str,
    channel: &'a str,
    payload: &'a serde_json::Value,
    scheduled_for: i64,
    attempt: u32,
}

/// Delivers notifications by POSTing them as JSON to a fixed URL. Any 2xx
/// response counts as delivered.
#[derive(Clone)]
pub struct WebhookDeliveryAdapter {
    client: Client,
    url: String,
}

impl WebhookDeliveryAdapter {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DeliveryAdapter for WebhookDeliveryAdapter {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, notification: &QueuedNotification) -> Result<(), DeliveryError> {
        let body = WebhookBody {
            id: &notification.id,
            recipient: &notification.recipient,
            channel: &notification.channel,
            payload: &notification.payload,
            scheduled_for: notification.scheduled_for,
            attempt: notification.attempts + 1,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected(format!(
                "webhook responded with status {}",
                status
            )));
        }
        Ok(())
    }
}
