use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Counter, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Metric name prefix for all worker metrics
const PREFIX: &str = "cadence_worker";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Job execution metrics
    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_executions_total"), "Total background job runs by outcome"),
        &["job", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job run duration in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0]),
        &["job"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref BACKGROUND_JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_background_job_running"), "Whether a background job is currently running"),
        &["job"]
    ).expect("Failed to create background_job_running metric");

    pub static ref BACKGROUND_JOB_SKIPPED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_skipped_total"), "Ticks skipped because the previous run was still active"),
        &["job"]
    ).expect("Failed to create background_job_skipped_total metric");

    // Drain metrics
    pub static ref DRAIN_ITEMS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_drain_items_total"), "Items handled by drain passes by result"),
        &["job", "result"]
    ).expect("Failed to create drain_items_total metric");

    pub static ref NOTIFICATION_DEAD_LETTERED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_notification_dead_lettered_total"),
        "Notifications moved to failed after exhausting delivery attempts"
    ).expect("Failed to create notification_dead_lettered_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_SKIPPED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DRAIN_ITEMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATION_DEAD_LETTERED_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record a finished background job run
pub fn record_background_job_execution(job: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job, status])
        .inc();

    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job])
        .observe(duration.as_secs_f64());
}

pub fn set_background_job_running(job: &str, running: bool) {
    BACKGROUND_JOB_RUNNING
        .with_label_values(&[job])
        .set(if running { 1.0 } else { 0.0 });
}

pub fn record_background_job_skipped(job: &str) {
    BACKGROUND_JOB_SKIPPED_TOTAL.with_label_values(&[job]).inc();
}

/// Record the per-item counters of one drain pass
pub fn record_drain_pass(job: &str, processed: usize, failed: usize) {
    DRAIN_ITEMS_TOTAL
        .with_label_values(&[job, "processed"])
        .inc_by(processed as f64);
    DRAIN_ITEMS_TOTAL
        .with_label_values(&[job, "failed"])
        .inc_by(failed as f64);
}

pub fn record_notification_dead_lettered() {
    NOTIFICATION_DEAD_LETTERED_TOTAL.inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Serve `/metrics` on the given port until `shutdown` fires.
pub async fn serve_metrics(port: u16, shutdown: CancellationToken) -> anyhow::Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Metrics available at port {}", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
