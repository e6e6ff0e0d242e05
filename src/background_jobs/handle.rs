use super::job::{JobError, JobSchedule};
use super::scheduler::JobDefinition;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Information about a registered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub name: String,
    pub description: String,
    pub schedule: JobScheduleInfo,
    pub is_running: bool,
    pub next_run_at: Option<String>,
}

/// Serializable schedule information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobScheduleInfo {
    #[serde(rename = "type")]
    pub schedule_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
}

impl From<&JobSchedule> for JobScheduleInfo {
    fn from(schedule: &JobSchedule) -> Self {
        match schedule {
            JobSchedule::Cron(cadence) => JobScheduleInfo {
                schedule_type: "cron".to_string(),
                cron: Some(cadence.as_str().to_string()),
                interval_ms: None,
            },
            JobSchedule::Interval(interval) => JobScheduleInfo {
                schedule_type: "interval".to_string(),
                cron: None,
                interval_ms: Some(interval.as_millis() as u64),
            },
        }
    }
}

/// Command sent to the scheduler loop.
pub enum SchedulerCommand {
    TriggerJob {
        job_name: String,
        response: oneshot::Sender<Result<(), JobError>>,
    },
}

/// Shared state between the scheduler loop and its handles.
pub struct SharedJobState {
    /// Registered jobs, fixed once the scheduler starts
    pub jobs: HashMap<String, JobDefinition>,
    /// Names of jobs with a run in flight
    pub running_jobs: HashSet<String>,
    /// Next scheduled fire per job
    pub next_runs: HashMap<String, DateTime<Utc>>,
}

impl SharedJobState {
    pub fn new(jobs: HashMap<String, JobDefinition>) -> Self {
        Self {
            jobs,
            running_jobs: HashSet::new(),
            next_runs: HashMap::new(),
        }
    }

    fn job_info(&self, name: &str, definition: &JobDefinition) -> JobInfo {
        JobInfo {
            name: name.to_string(),
            description: definition.job.description().to_string(),
            schedule: (&definition.schedule).into(),
            is_running: self.running_jobs.contains(name),
            next_run_at: self.next_runs.get(name).map(|t| t.to_rfc3339()),
        }
    }
}

/// Handle to interact with a started scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    /// Channel to send commands to the scheduler
    command_tx: mpsc::Sender<SchedulerCommand>,
    /// Shared state for reading job info
    shared_state: Arc<RwLock<SharedJobState>>,
}

impl SchedulerHandle {
    pub fn new(
        command_tx: mpsc::Sender<SchedulerCommand>,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            command_tx,
            shared_state,
        }
    }

    /// Get information about all registered jobs, sorted by name.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let state = self.shared_state.read().await;
        let mut jobs: Vec<JobInfo> = state
            .jobs
            .iter()
            .map(|(name, definition)| state.job_info(name, definition))
            .collect();

        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }

    /// Get information about a specific job.
    pub async fn get_job(&self, job_name: &str) -> Option<JobInfo> {
        let state = self.shared_state.read().await;
        state
            .jobs
            .get(job_name)
            .map(|definition| state.job_info(job_name, definition))
    }

    /// Run a job now, outside its cadence. Subject to the same busy guard as
    /// scheduled ticks.
    pub async fn trigger_job(&self, job_name: &str) -> Result<(), JobError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::TriggerJob {
                job_name: job_name.to_string(),
                response: response_tx,
            })
            .await
            .map_err(|_| JobError::ExecutionFailed("Scheduler not available".to_string()))?;

        response_rx
            .await
            .map_err(|_| JobError::ExecutionFailed("Scheduler did not respond".to_string()))?
    }

    /// Check if a job is currently running.
    pub async fn is_job_running(&self, job_name: &str) -> bool {
        let state = self.shared_state.read().await;
        state.running_jobs.contains(job_name)
    }

    /// Check if a job with the given name exists.
    pub async fn job_exists(&self, job_name: &str) -> bool {
        let state = self.shared_state.read().await;
        state.jobs.contains_key(job_name)
    }
}
