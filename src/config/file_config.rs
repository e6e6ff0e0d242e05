use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub metrics_port: Option<u16>,
    pub shutdown_grace_secs: Option<u64>,

    // Feature configs
    pub background_jobs: Option<BackgroundJobsConfig>,
    pub delivery: Option<DeliveryConfig>,
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackgroundJobsConfig {
    pub notification_dispatch: Option<NotificationDispatchJobConfig>,
    pub blacklist_audit: Option<BlacklistAuditJobConfig>,
    pub payment_webhook: Option<PaymentWebhookJobConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct NotificationDispatchJobConfig {
    pub enabled: Option<bool>,
    pub cron: Option<String>,
    pub batch_size: Option<usize>,
    /// Failed attempts before an item is dead-lettered; 0 retries forever.
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BlacklistAuditJobConfig {
    pub enabled: Option<bool>,
    pub cron: Option<String>,
    pub key_prefix: Option<String>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PaymentWebhookJobConfig {
    pub enabled: Option<bool>,
    pub cron: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DeliveryConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
