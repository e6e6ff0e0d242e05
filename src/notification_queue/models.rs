//! Data models for the notification queue.

use serde::{Deserialize, Serialize};

/// Delivery status of a queued notification.
///
/// Status transitions are monotonic: `Pending` may move to `Sent` or `Failed`,
/// both of which are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(NotificationStatus::Pending),
            "sent" => Some(NotificationStatus::Sent),
            "failed" => Some(NotificationStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, NotificationStatus::Pending)
    }
}

/// A notification waiting in (or retired from) the queue.
///
/// Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedNotification {
    pub id: String,
    pub recipient: String,
    pub channel: String,
    pub payload: serde_json::Value,
    pub status: NotificationStatus,
    pub scheduled_for: i64,
    pub created_at: i64,
    pub sent_at: Option<i64>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl QueuedNotification {
    /// Create a pending notification due at `scheduled_for`.
    pub fn new(
        recipient: impl Into<String>,
        channel: impl Into<String>,
        payload: serde_json::Value,
        scheduled_for: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient: recipient.into(),
            channel: channel.into(),
            payload,
            status: NotificationStatus::Pending,
            scheduled_for,
            created_at: now_millis(),
            sent_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// Create a pending notification that is due immediately.
    pub fn due_now(
        recipient: impl Into<String>,
        channel: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(recipient, channel, payload, now_millis())
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.status == NotificationStatus::Pending && self.scheduled_for <= now
    }
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
