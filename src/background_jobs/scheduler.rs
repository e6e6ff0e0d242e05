use super::context::JobContext;
use super::handle::{SchedulerCommand, SchedulerHandle, SharedJobState};
use super::job::{BackgroundJob, JobError, JobSchedule, SchedulerError, ShutdownBehavior};
use super::runner;
use crate::metrics;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default time running jobs get to finish once the scheduler stops.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// How long the loop sleeps when nothing is scheduled.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// A registered job: its unique name, when it fires and what it runs.
#[derive(Clone)]
pub struct JobDefinition {
    pub name: String,
    pub schedule: JobSchedule,
    pub job: Arc<dyn BackgroundJob>,
}

struct RunningScheduler {
    shutdown_token: CancellationToken,
    loop_handle: JoinHandle<()>,
    handle: SchedulerHandle,
}

/// Registry of named jobs and the owner of the scheduler loop.
///
/// Jobs are registered while the scheduler is stopped. `start` arms every
/// registered schedule; `stop` stops future ticks and waits for in-flight runs.
pub struct JobScheduler {
    definitions: HashMap<String, JobDefinition>,
    grace_period: Duration,
    running: Option<RunningScheduler>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_GRACE)
    }
}

impl JobScheduler {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            definitions: HashMap::new(),
            grace_period,
            running: None,
        }
    }

    /// Register a job under a unique name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        schedule: JobSchedule,
        job: Arc<dyn BackgroundJob>,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        if self.running.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }
        if self.definitions.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob(name));
        }
        if let JobSchedule::Interval(interval) = &schedule {
            if interval.is_zero() {
                return Err(SchedulerError::ZeroInterval(name));
            }
        }

        info!(
            "Registering job: {} ({}) - {}",
            name,
            schedule.describe(),
            job.description()
        );
        self.definitions.insert(
            name.clone(),
            JobDefinition {
                name,
                schedule,
                job,
            },
        );
        Ok(())
    }

    /// Register a job on a five-field cadence expression.
    pub fn register_cron(
        &mut self,
        name: impl Into<String>,
        expr: &str,
        job: Arc<dyn BackgroundJob>,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        let schedule = JobSchedule::cron(expr).map_err(|source| SchedulerError::InvalidCadence {
            job: name.clone(),
            source,
        })?;
        self.register(name, schedule, job)
    }

    /// Get the number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Handle to the started scheduler, if any.
    pub fn handle(&self) -> Option<SchedulerHandle> {
        self.running.as_ref().map(|r| r.handle.clone())
    }

    /// Arm every registered schedule. Must be called within a Tokio runtime.
    pub fn start(&mut self) -> Result<SchedulerHandle, SchedulerError> {
        if self.running.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }

        let (command_tx, command_rx) = mpsc::channel(100);
        let started = Instant::now();
        let entries: Vec<ScheduledEntry> = self
            .definitions
            .values()
            .cloned()
            .map(|d| ScheduledEntry::new(d, started))
            .collect();

        // Next runs are known before the loop is first polled.
        let mut state = SharedJobState::new(self.definitions.clone());
        state.next_runs = entries
            .iter()
            .map(|e| (e.definition.name.clone(), e.next_run_at()))
            .collect();
        let shared_state = Arc::new(RwLock::new(state));
        let shutdown_token = CancellationToken::new();

        let mut scheduler_loop = SchedulerLoop::new(
            entries,
            Arc::clone(&shared_state),
            command_rx,
            shutdown_token.clone(),
            self.grace_period,
        );
        let loop_handle = tokio::spawn(async move { scheduler_loop.run().await });

        let handle = SchedulerHandle::new(command_tx, shared_state);
        self.running = Some(RunningScheduler {
            shutdown_token,
            loop_handle,
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// Stop future ticks and wait (up to the grace period) for in-flight runs.
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        let running = self.running.take().ok_or(SchedulerError::NotStarted)?;
        running.shutdown_token.cancel();
        if let Err(e) = running.loop_handle.await {
            error!("Scheduler loop ended abnormally: {}", e);
        }
        Ok(())
    }
}

/// Per-job timing state owned by the loop.
struct ScheduledEntry {
    definition: JobDefinition,
    next_due: Instant,
    /// Wall-clock target of the next cron fire.
    next_target: Option<DateTime<Utc>>,
}

impl ScheduledEntry {
    fn new(definition: JobDefinition, started: Instant) -> Self {
        let mut entry = Self {
            definition,
            next_due: started,
            next_target: None,
        };
        match entry.definition.schedule {
            JobSchedule::Interval(interval) => entry.next_due = started + interval,
            JobSchedule::Cron(_) => entry.arm_cron(Utc::now()),
        }
        entry
    }

    /// Point the entry at the first cron fire strictly after `after`.
    fn arm_cron(&mut self, after: DateTime<Utc>) {
        let JobSchedule::Cron(cadence) = &self.definition.schedule else {
            return;
        };
        match cadence.next_after(after) {
            Some(target) => {
                let wait = (target - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                self.next_due = Instant::now() + wait;
                self.next_target = Some(target);
            }
            None => {
                warn!(
                    "Cadence {} for job {} has no further fire times",
                    cadence, self.definition.name
                );
                self.next_due = Instant::now() + IDLE_CHECK_INTERVAL;
                self.next_target = None;
            }
        }
    }

    /// Move past the tick that just fired, skipping any that were missed.
    fn advance(&mut self) {
        match self.definition.schedule {
            JobSchedule::Interval(interval) => {
                let now = Instant::now();
                self.next_due += interval;
                while self.next_due <= now {
                    self.next_due += interval;
                }
            }
            JobSchedule::Cron(_) => {
                let after = match self.next_target {
                    Some(target) => target.max(Utc::now()),
                    None => Utc::now(),
                };
                self.arm_cron(after);
            }
        }
    }

    fn next_run_at(&self) -> DateTime<Utc> {
        match self.next_target {
            Some(target) => target,
            None => {
                let wait = self.next_due.saturating_duration_since(Instant::now());
                Utc::now() + chrono::Duration::from_std(wait).unwrap_or_default()
            }
        }
    }
}

/// The task that waits for ticks, applies the busy guard and spawns runs.
struct SchedulerLoop {
    entries: Vec<ScheduledEntry>,
    shared_state: Arc<RwLock<SharedJobState>>,
    running_handles: HashMap<String, JoinHandle<()>>,
    job_cancel_tokens: HashMap<String, CancellationToken>,
    command_receiver: mpsc::Receiver<SchedulerCommand>,
    shutdown_token: CancellationToken,
    grace_period: Duration,
}

impl SchedulerLoop {
    fn new(
        entries: Vec<ScheduledEntry>,
        shared_state: Arc<RwLock<SharedJobState>>,
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        grace_period: Duration,
    ) -> Self {
        Self {
            entries,
            shared_state,
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            command_receiver,
            shutdown_token,
            grace_period,
        }
    }

    async fn run(&mut self) {
        info!(
            "Starting job scheduler with {} registered jobs",
            self.entries.len()
        );

        loop {
            self.cleanup_completed_jobs();

            let next_due = self
                .entries
                .iter()
                .map(|e| e.next_due)
                .min()
                .unwrap_or_else(|| Instant::now() + IDLE_CHECK_INTERVAL);

            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
                _ = tokio::time::sleep_until(next_due) => {
                    self.run_due_jobs().await;
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::TriggerJob { job_name, response } => {
                let result = self.trigger_job(&job_name).await;
                let _ = response.send(result);
            }
        }
    }

    async fn trigger_job(&mut self, job_name: &str) -> Result<(), JobError> {
        let definition = self
            .entries
            .iter()
            .find(|e| e.definition.name == job_name)
            .map(|e| e.definition.clone())
            .ok_or(JobError::NotFound)?;

        if self.is_busy(job_name).await {
            return Err(JobError::AlreadyRunning);
        }

        info!("Manually triggering job: {}", job_name);
        self.spawn_job(definition).await;
        Ok(())
    }

    async fn is_busy(&self, job_name: &str) -> bool {
        self.shared_state.read().await.running_jobs.contains(job_name)
    }

    /// Fire every entry whose tick has arrived.
    async fn run_due_jobs(&mut self) {
        let now = Instant::now();
        let due: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.next_due <= now)
            .map(|(i, _)| i)
            .collect();

        for index in due {
            let definition = self.entries[index].definition.clone();
            if self.is_busy(&definition.name).await {
                warn!(job = %definition.name, "job.skipped: previous run still in progress");
                metrics::record_background_job_skipped(&definition.name);
            } else {
                self.spawn_job(definition).await;
            }
            self.entries[index].advance();
        }

        self.publish_next_runs().await;
    }

    async fn publish_next_runs(&self) {
        let mut state = self.shared_state.write().await;
        for entry in &self.entries {
            state
                .next_runs
                .insert(entry.definition.name.clone(), entry.next_run_at());
        }
    }

    async fn spawn_job(&mut self, definition: JobDefinition) {
        let job_name = definition.name.clone();

        // Marked before the task exists so that a tick arriving before the
        // task is polled still sees the job as busy.
        {
            let mut state = self.shared_state.write().await;
            state.running_jobs.insert(job_name.clone());
        }

        let cancel_token = CancellationToken::new();
        self.job_cancel_tokens
            .insert(job_name.clone(), cancel_token.clone());

        let ctx = JobContext::new(job_name.clone(), cancel_token);
        let shared_state = Arc::clone(&self.shared_state);
        let job = Arc::clone(&definition.job);
        let task_name = job_name.clone();

        let handle = tokio::spawn(async move {
            let run = runner::run_job(job, ctx).await;
            debug!(
                "Job {} finished with {} after {}ms",
                run.job_name,
                run.outcome.as_str(),
                run.duration_ms
            );

            let mut state = shared_state.write().await;
            state.running_jobs.remove(&task_name);
        });

        self.running_handles.insert(job_name, handle);
    }

    fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();

        for job_name in completed {
            self.running_handles.remove(&job_name);
            self.job_cancel_tokens.remove(&job_name);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_name, token) in &self.job_cancel_tokens {
            let behavior = self
                .entries
                .iter()
                .find(|e| &e.definition.name == job_name)
                .map(|e| e.definition.job.shutdown_behavior())
                .unwrap_or_default();
            if behavior == ShutdownBehavior::Cancellable {
                debug!("Cancelling job: {}", job_name);
                token.cancel();
            } else {
                info!("Waiting for job {} to complete...", job_name);
            }
        }

        let deadline = Instant::now() + self.grace_period;
        for (job_name, mut handle) in self.running_handles.drain() {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!(
                    "Job {} did not finish within {:?}, aborting",
                    job_name, self.grace_period
                );
                handle.abort();
                metrics::set_background_job_running(&job_name, false);
            }
        }

        self.job_cancel_tokens.clear();
        self.shared_state.write().await.running_jobs.clear();
        info!("Scheduler shutdown complete");
    }
}
