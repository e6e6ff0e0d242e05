//! Execution wrapper for a single job run.
//!
//! `run_job` is the only place a job body is awaited. It times the run,
//! contains every failure mode of the body (returned errors, cancellation
//! and panics) and reports exactly one start line plus one outcome line.

use super::context::JobContext;
use super::job::{BackgroundJob, JobError};
use crate::metrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Failure => "failure",
        }
    }
}

/// Record of one run. Handed back to the caller and then dropped; the engine
/// keeps no run history of its own.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: JobOutcome,
    pub error: Option<String>,
}

impl JobRun {
    pub fn is_success(&self) -> bool {
        self.outcome == JobOutcome::Success
    }
}

/// Aborts the body task if the wrapper itself is dropped mid-run.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `job` once under `ctx`, never propagating its failure.
pub async fn run_job(job: Arc<dyn BackgroundJob>, ctx: JobContext) -> JobRun {
    let job_name = ctx.job_name.clone();
    let started_at = Utc::now();
    let start_time = Instant::now();

    info!(job = %job_name, "job.start");
    metrics::set_background_job_running(&job_name, true);

    let body_ctx = ctx.clone();
    let body = tokio::spawn(async move { job.execute(&body_ctx).await });
    let _guard = AbortOnDrop(body.abort_handle());
    let result = body.await;

    let elapsed = start_time.elapsed();
    let duration_ms = elapsed.as_millis() as u64;

    let (outcome, error_msg, status_label) = match result {
        Ok(Ok(())) => {
            info!(job = %job_name, duration_ms, "job.success");
            (JobOutcome::Success, None, "success")
        }
        Ok(Err(JobError::Cancelled)) => {
            warn!(job = %job_name, duration_ms, error = "cancelled", "job.failure");
            (
                JobOutcome::Failure,
                Some(JobError::Cancelled.to_string()),
                "cancelled",
            )
        }
        Ok(Err(e)) => {
            error!(job = %job_name, duration_ms, error = %e, "job.failure");
            (JobOutcome::Failure, Some(e.to_string()), "failure")
        }
        Err(e) => {
            let msg = if e.is_panic() {
                format!("Task panic: {}", e)
            } else {
                format!("Task aborted: {}", e)
            };
            error!(job = %job_name, duration_ms, error = %msg, "job.failure");
            (JobOutcome::Failure, Some(msg), "panic")
        }
    };

    metrics::record_background_job_execution(&job_name, status_label, elapsed);
    metrics::set_background_job_running(&job_name, false);

    JobRun {
        job_name,
        started_at,
        ended_at: Utc::now(),
        duration_ms,
        outcome,
        error: error_msg,
    }
}
