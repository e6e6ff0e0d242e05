use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cadence_worker::background_jobs::jobs::{
    blacklist_audit, notification_dispatch, payment_webhook, BlacklistAuditJob,
    NotificationDispatchJob, PaymentWebhookJob,
};
use cadence_worker::background_jobs::JobScheduler;
use cadence_worker::cache::{KeyValueCache, RedisCache};
use cadence_worker::config;
use cadence_worker::delivery::{DeliveryAdapter, LogDeliveryAdapter, WebhookDeliveryAdapter};
use cadence_worker::metrics;
use cadence_worker::notification_queue::{NotificationQueueStore, SqliteNotificationQueueStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(version, about = "Runs recurring background jobs on cron cadences")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the notification queue database.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port for the metrics server (Prometheus scraping). 0 disables it.
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,

    /// Seconds to wait for running jobs on shutdown before aborting them.
    #[clap(long, default_value_t = 30)]
    pub shutdown_grace_secs: u64,

    /// Redis URL of the cache audited by the blacklist job.
    /// Can also be specified in config file.
    #[clap(long)]
    pub redis_url: Option<String>,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            metrics_port: args.metrics_port,
            shutdown_grace_secs: args.shutdown_grace_secs,
            redis_url: args.redis_url.clone(),
        }
    }
}

fn build_delivery_adapter(settings: &config::DeliverySettings) -> Result<Arc<dyn DeliveryAdapter>> {
    match &settings.webhook_url {
        Some(url) => {
            let adapter = WebhookDeliveryAdapter::new(url.clone(), settings.timeout_secs)?;
            info!("Delivering notifications to webhook at {}", adapter.url());
            Ok(Arc::new(adapter))
        }
        None => {
            info!("No webhook configured, notifications will be delivered to the log");
            Ok(Arc::new(LogDeliveryAdapter))
        }
    }
}

fn build_scheduler(
    app_config: &config::AppConfig,
    store: Arc<dyn NotificationQueueStore>,
    adapter: Arc<dyn DeliveryAdapter>,
    cache: Option<Arc<dyn KeyValueCache>>,
) -> Result<JobScheduler> {
    let jobs = &app_config.background_jobs;
    let mut scheduler = JobScheduler::new(app_config.shutdown_grace);

    if jobs.notification_dispatch.enabled {
        let settings = &jobs.notification_dispatch;
        scheduler.register_cron(
            notification_dispatch::JOB_NAME,
            &settings.cron,
            Arc::new(NotificationDispatchJob::from_settings(settings, store, adapter)),
        )?;
    }

    if jobs.blacklist_audit.enabled {
        match cache {
            Some(cache) => {
                let settings = &jobs.blacklist_audit;
                scheduler.register_cron(
                    blacklist_audit::JOB_NAME,
                    &settings.cron,
                    Arc::new(BlacklistAuditJob::from_settings(settings, cache)),
                )?;
            }
            None => warn!(
                "Job {} is enabled but no redis_url is configured, not registering it",
                blacklist_audit::JOB_NAME
            ),
        }
    }

    if jobs.payment_webhook.enabled {
        scheduler.register_cron(
            payment_webhook::JOB_NAME,
            &jobs.payment_webhook.cron,
            Arc::new(PaymentWebhookJob::new()),
        )?;
    }

    Ok(scheduler)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  metrics_port: {}", app_config.metrics_port);
    info!("  shutdown_grace: {:?}", app_config.shutdown_grace);

    info!("Initializing metrics...");
    metrics::init_metrics();

    let db_path = app_config.notifications_db_path();
    info!("Opening notification queue at {:?}...", db_path);
    let store: Arc<dyn NotificationQueueStore> = Arc::new(
        SqliteNotificationQueueStore::new(&db_path)
            .with_context(|| format!("Failed to open notification queue at {:?}", db_path))?,
    );
    let adapter = build_delivery_adapter(&app_config.delivery)?;
    let cache: Option<Arc<dyn KeyValueCache>> = match &app_config.cache.redis_url {
        Some(url) => Some(Arc::new(
            RedisCache::connect(url)
                .await
                .with_context(|| format!("Failed to connect to Redis at {}", url))?,
        )),
        None => None,
    };

    let mut scheduler = build_scheduler(&app_config, store, adapter, cache)?;
    let handle = scheduler.start()?;
    info!("Job scheduler started with {} job(s)", scheduler.job_count());
    for job in handle.list_jobs().await {
        info!(
            "  {} next run at {}",
            job.name,
            job.next_run_at.as_deref().unwrap_or("never")
        );
    }

    let shutdown_token = CancellationToken::new();
    let metrics_task = if app_config.metrics_port != 0 {
        let port = app_config.metrics_port;
        let token = shutdown_token.child_token();
        Some(tokio::spawn(async move {
            if let Err(e) = metrics::serve_metrics(port, token).await {
                error!("Metrics server failed: {:#}", e);
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, initiating graceful shutdown");

    scheduler.stop().await?;
    shutdown_token.cancel();
    if let Some(task) = metrics_task {
        let _ = task.await;
    }

    info!("Shutdown complete");
    Ok(())
}
