//! Background job scheduling and execution system.
//!
//! Jobs are registered by name on a cadence, fired by a single scheduler loop,
//! guarded so that a job never overlaps itself, and run through an execution
//! wrapper that contains every failure. Batch-style jobs build on the drain
//! helpers in [`drain`].

pub mod cadence;
mod context;
pub mod drain;
mod handle;
mod job;
pub mod jobs;
pub mod runner;
mod scheduler;

pub use cadence::{Cadence, CadenceError};
pub use context::JobContext;
pub use drain::{
    drain_batch, drain_pass, log_summary, DrainPass, DrainSummary, DrainWorker, ItemError,
    DEFAULT_BATCH_SIZE,
};
pub use handle::{JobInfo, JobScheduleInfo, SchedulerHandle};
pub use job::{BackgroundJob, JobError, JobSchedule, SchedulerError, ShutdownBehavior};
pub use runner::{run_job, JobOutcome, JobRun};
pub use scheduler::{JobDefinition, JobScheduler, DEFAULT_SHUTDOWN_GRACE};
