//! Specific background job implementations.

pub mod blacklist_audit;
pub mod notification_dispatch;
pub mod payment_webhook;

pub use blacklist_audit::{AuditReport, BlacklistAuditJob};
pub use notification_dispatch::NotificationDispatchJob;
pub use payment_webhook::PaymentWebhookJob;
