use tokio_util::sync::CancellationToken;

/// Context provided to a job for one run.
#[derive(Clone)]
pub struct JobContext {
    /// Name the job was registered under.
    pub job_name: String,

    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,
}

impl JobContext {
    pub fn new(job_name: impl Into<String>, cancellation_token: CancellationToken) -> Self {
        Self {
            job_name: job_name.into(),
            cancellation_token,
        }
    }

    /// Whether the scheduler asked this run to stop. Batch jobs check it
    /// between items.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
