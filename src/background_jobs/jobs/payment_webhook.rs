//! Payment webhook intake job.
//!
//! Placeholder for reconciling queued payment-provider webhooks. It selects
//! nothing yet and only reports that it ran.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError},
};
use async_trait::async_trait;
use tracing::info;

pub const JOB_NAME: &str = "payment_webhook";

#[derive(Debug, Default)]
pub struct PaymentWebhookJob;

impl PaymentWebhookJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackgroundJob for PaymentWebhookJob {
    fn description(&self) -> &'static str {
        "Process queued payment webhooks (placeholder)"
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        info!(job = JOB_NAME, "Payment webhook intake completed, nothing to process");
        Ok(())
    }
}
