use super::cadence::{Cadence, CadenceError};
use super::context::JobContext;
use async_trait::async_trait;
use std::time::Duration;

/// Schedule for when a job should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSchedule {
    /// Run on a five-field cadence expression.
    Cron(Cadence),
    /// Run at fixed intervals, measured from scheduler start.
    Interval(Duration),
}

impl JobSchedule {
    /// Parse a cadence expression into a cron schedule.
    pub fn cron(expr: &str) -> Result<Self, CadenceError> {
        Ok(JobSchedule::Cron(Cadence::parse(expr)?))
    }

    pub fn describe(&self) -> String {
        match self {
            JobSchedule::Cron(cadence) => format!("cron({})", cadence),
            JobSchedule::Interval(interval) => format!("every {:?}", interval),
        }
    }
}

/// How a job should be handled during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownBehavior {
    /// Job is signalled to stop as soon as shutdown starts
    #[default]
    Cancellable,
    /// Job is left alone until the grace period runs out
    WaitForCompletion,
}

/// Errors that can occur during job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job not found")]
    NotFound,
    #[error("Job is already running")]
    AlreadyRunning,
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Job was cancelled")]
    Cancelled,
}

/// Errors raised by the scheduler registry itself.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("a job named '{0}' is already registered")]
    DuplicateJob(String),
    #[error("invalid cadence for job '{job}': {source}")]
    InvalidCadence {
        job: String,
        #[source]
        source: CadenceError,
    },
    #[error("interval for job '{0}' must be greater than zero")]
    ZeroInterval(String),
    #[error("scheduler is already started")]
    AlreadyStarted,
    #[error("scheduler is not running")]
    NotStarted,
}

/// The body of a scheduled job.
///
/// A body is an arbitrary asynchronous action. Errors it returns (and panics
/// it raises) are contained by the execution wrapper and never reach the
/// scheduler.
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    /// Description of what this job does.
    fn description(&self) -> &'static str {
        ""
    }

    /// How this job should be handled during shutdown.
    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    /// Execute one run of the job.
    ///
    /// Long-running bodies should check `ctx.is_cancelled()` between units of
    /// work and return `JobError::Cancelled` when it is set.
    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
