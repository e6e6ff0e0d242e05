//! Bounded-batch, isolate-per-item drain pattern.
//!
//! A drain pass selects at most `bound` items (oldest first, as ordered by the
//! worker's selection query), runs the per-item action on each one in turn and
//! aggregates the results. A failing or panicking item is logged with its
//! identity and counted; it never stops the remaining items from being
//! processed. Only a failure of the selection itself fails the pass.

use super::context::JobContext;
use super::job::JobError;
use crate::metrics;
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use tracing::{info, warn};

/// Default upper bound on the number of items selected per pass.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Failure of a single item's action.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("dead-lettered after {attempts} attempts: {reason}")]
    DeadLettered { attempts: u32, reason: String },
    #[error("item action panicked")]
    Panicked,
}

/// Per-pass counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    pub selected: usize,
    pub processed: usize,
    pub failed: usize,
    /// Set when cancellation stopped the pass before every selected item ran.
    pub interrupted: bool,
}

impl DrainSummary {
    /// Whether the pass found nothing to do.
    pub fn is_idle(&self) -> bool {
        self.selected == 0
    }

    /// Selected items that were never acted on.
    pub fn untouched(&self) -> usize {
        self.selected - self.processed - self.failed
    }

    /// Fold another window's counters into this one.
    pub fn merge(&mut self, other: &DrainSummary) {
        self.selected += other.selected;
        self.processed += other.processed;
        self.failed += other.failed;
        self.interrupted |= other.interrupted;
    }
}

/// Result of one pass: the counters plus the output of each successful item,
/// in processing order.
#[derive(Debug)]
pub struct DrainPass<O> {
    pub summary: DrainSummary,
    pub outputs: Vec<O>,
}

impl<O> DrainPass<O> {
    fn idle() -> Self {
        Self {
            summary: DrainSummary::default(),
            outputs: Vec::new(),
        }
    }
}

/// The two parameters of a drain: what to select and what to do per item.
#[async_trait]
pub trait DrainWorker: Send + Sync {
    type Item: Send + Sync;
    type Output: Send;

    /// Identity used when logging a failed item.
    fn item_id(&self, item: &Self::Item) -> String;

    /// Select at most `limit` items, oldest first.
    async fn select(&self, limit: usize) -> Result<Vec<Self::Item>, JobError>;

    /// Act on one item.
    async fn process(&self, item: &Self::Item) -> Result<Self::Output, ItemError>;
}

/// Run one drain pass of `worker` with at most `bound` items, logging
/// `drain.idle` or a single `drain.summary` for it.
pub async fn drain_pass<W>(
    worker: &W,
    bound: usize,
    ctx: &JobContext,
) -> Result<DrainPass<W::Output>, JobError>
where
    W: DrainWorker + ?Sized,
{
    let pass = drain_batch(worker, bound, ctx).await?;
    log_summary(ctx.job_name.as_str(), &pass.summary);
    Ok(pass)
}

/// Select and process one batch without logging its summary.
///
/// For jobs that drain several windows in one tick and report them together
/// with [`log_summary`].
pub async fn drain_batch<W>(
    worker: &W,
    bound: usize,
    ctx: &JobContext,
) -> Result<DrainPass<W::Output>, JobError>
where
    W: DrainWorker + ?Sized,
{
    let job = ctx.job_name.as_str();

    let mut selected = worker.select(bound).await?;
    if selected.len() > bound {
        warn!(
            job,
            returned = selected.len(),
            bound,
            "selection returned more items than requested, truncating"
        );
        selected.truncate(bound);
    }

    if selected.is_empty() {
        return Ok(DrainPass::idle());
    }

    let mut summary = DrainSummary {
        selected: selected.len(),
        ..Default::default()
    };
    let mut outputs = Vec::with_capacity(selected.len());

    for item in &selected {
        if ctx.is_cancelled() {
            summary.interrupted = true;
            break;
        }

        let result = AssertUnwindSafe(worker.process(item))
            .catch_unwind()
            .await
            .unwrap_or(Err(ItemError::Panicked));

        match result {
            Ok(output) => {
                summary.processed += 1;
                outputs.push(output);
            }
            Err(e) => {
                summary.failed += 1;
                warn!(job, item_id = %worker.item_id(item), error = %e, "drain item failed");
            }
        }
    }

    if summary.interrupted {
        warn!(
            job,
            untouched = summary.untouched(),
            "drain pass interrupted by cancellation"
        );
    }
    metrics::record_drain_pass(job, summary.processed, summary.failed);

    Ok(DrainPass { summary, outputs })
}

/// Log the outcome of a tick's drain: one `drain.idle` line when nothing was
/// selected, otherwise one `drain.summary`.
pub fn log_summary(job: &str, summary: &DrainSummary) {
    if summary.is_idle() {
        info!(job, "drain.idle: nothing to do");
        return;
    }
    info!(
        job,
        selected = summary.selected,
        processed = summary.processed,
        failed = summary.failed,
        "drain.summary"
    );
}
