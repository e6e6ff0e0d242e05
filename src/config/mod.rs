mod file_config;

pub use file_config::{
    BackgroundJobsConfig, BlacklistAuditJobConfig, CacheConfig, DeliveryConfig, FileConfig,
    NotificationDispatchJobConfig, PaymentWebhookJobConfig,
};

use crate::background_jobs::{Cadence, DEFAULT_BATCH_SIZE};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub metrics_port: u16,
    pub shutdown_grace_secs: u64,
    pub redis_url: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            metrics_port: 9092,
            shutdown_grace_secs: 30,
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub metrics_port: u16,
    pub shutdown_grace: Duration,

    // Feature configs (with defaults)
    pub background_jobs: BackgroundJobsSettings,
    pub delivery: DeliverySettings,
    pub cache: CacheSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        let shutdown_grace =
            Duration::from_secs(file.shutdown_grace_secs.unwrap_or(cli.shutdown_grace_secs));

        let jobs_file = file.background_jobs.unwrap_or_default();
        let background_jobs = BackgroundJobsSettings {
            notification_dispatch: NotificationDispatchJobSettings::resolve(
                jobs_file.notification_dispatch.unwrap_or_default(),
            )?,
            blacklist_audit: BlacklistAuditJobSettings::resolve(
                jobs_file.blacklist_audit.unwrap_or_default(),
            )?,
            payment_webhook: PaymentWebhookJobSettings::resolve(
                jobs_file.payment_webhook.unwrap_or_default(),
            )?,
        };

        let delivery_file = file.delivery.unwrap_or_default();
        let defaults = DeliverySettings::default();
        let delivery = DeliverySettings {
            webhook_url: delivery_file.webhook_url.filter(|url| !url.trim().is_empty()),
            timeout_secs: delivery_file.timeout_secs.unwrap_or(defaults.timeout_secs),
        };

        let cache = CacheSettings {
            redis_url: file
                .cache
                .and_then(|c| c.redis_url)
                .or_else(|| cli.redis_url.clone())
                .filter(|url| !url.trim().is_empty()),
        };

        Ok(Self {
            db_dir,
            metrics_port,
            shutdown_grace,
            background_jobs,
            delivery,
            cache,
        })
    }

    pub fn notifications_db_path(&self) -> PathBuf {
        self.db_dir.join("notifications.db")
    }
}

/// Fail fast on a cadence that could never be registered.
fn validate_cron(job: &str, cron: String) -> Result<String> {
    Cadence::parse(&cron).with_context(|| format!("Invalid cron for job {}", job))?;
    Ok(cron)
}

fn validate_batch_size(job: &str, batch_size: usize) -> Result<usize> {
    if batch_size == 0 {
        bail!("batch_size for job {} must be greater than zero", job);
    }
    Ok(batch_size)
}

#[derive(Debug, Clone, Default)]
pub struct BackgroundJobsSettings {
    pub notification_dispatch: NotificationDispatchJobSettings,
    pub blacklist_audit: BlacklistAuditJobSettings,
    pub payment_webhook: PaymentWebhookJobSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDispatchJobSettings {
    pub enabled: bool,
    pub cron: String,
    pub batch_size: usize,
    /// 0 disables dead-lettering.
    pub max_attempts: u32,
}

impl Default for NotificationDispatchJobSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "* * * * *".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: 10,
        }
    }
}

impl NotificationDispatchJobSettings {
    fn resolve(file: NotificationDispatchJobConfig) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: file.enabled.unwrap_or(defaults.enabled),
            cron: validate_cron(
                "notification_dispatch",
                file.cron.unwrap_or(defaults.cron),
            )?,
            batch_size: validate_batch_size(
                "notification_dispatch",
                file.batch_size.unwrap_or(defaults.batch_size),
            )?,
            max_attempts: file.max_attempts.unwrap_or(defaults.max_attempts),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistAuditJobSettings {
    pub enabled: bool,
    pub cron: String,
    pub key_prefix: String,
    pub batch_size: usize,
}

impl Default for BlacklistAuditJobSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "*/5 * * * *".to_string(),
            key_prefix: "blacklist:pending:".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BlacklistAuditJobSettings {
    fn resolve(file: BlacklistAuditJobConfig) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: file.enabled.unwrap_or(defaults.enabled),
            cron: validate_cron("blacklist_audit", file.cron.unwrap_or(defaults.cron))?,
            key_prefix: file.key_prefix.unwrap_or(defaults.key_prefix),
            batch_size: validate_batch_size(
                "blacklist_audit",
                file.batch_size.unwrap_or(defaults.batch_size),
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentWebhookJobSettings {
    pub enabled: bool,
    pub cron: String,
}

impl Default for PaymentWebhookJobSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "*/10 * * * *".to_string(),
        }
    }
}

impl PaymentWebhookJobSettings {
    fn resolve(file: PaymentWebhookJobConfig) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: file.enabled.unwrap_or(defaults.enabled),
            cron: validate_cron("payment_webhook", file.cron.unwrap_or(defaults.cron))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    /// When unset, notifications are delivered to the log.
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSettings {
    /// Redis instance holding the blacklist entries. The audit job is not
    /// registered without one.
    pub redis_url: Option<String>,
}
