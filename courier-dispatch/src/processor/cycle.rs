//! A single dispatch cycle: reconcile, fetch, then deliver with bounded concurrency

use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_common::{dispatch, tracing::error};
use tokio::task::JoinSet;

use super::{DispatchProcessor, process::process_job};
use crate::{
    error::DeliveryError,
    types::{CycleReport, JobOutcome},
};

impl DispatchProcessor {
    /// Run one cycle at the current wall-clock time
    ///
    /// # Errors
    /// If the due batch cannot be fetched; nothing was touched in that case
    pub async fn run_cycle(self: &Arc<Self>) -> Result<CycleReport, DeliveryError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle treating `now` as the current time for due selection
    ///
    /// 1. Re-apply outcome writes that failed in earlier cycles
    /// 2. Fetch up to `batch_size` due jobs, earliest first
    /// 3. Claim and deliver each, up to `max_concurrent_deliveries` at once
    ///
    /// Per-job failures are recorded in the report and never abort the batch.
    ///
    /// # Errors
    /// If the due batch cannot be fetched
    pub async fn run_cycle_at(
        self: &Arc<Self>,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, DeliveryError> {
        let mut report = CycleReport::started(now);

        report.reconciled = self.reconcile_outcomes().await;

        let batch = self
            .store
            .fetch_due_batch(now, self.config.batch_size)
            .await?;
        report.found = batch.len();

        if batch.is_empty() {
            dispatch!(level = DEBUG, "No due jobs");
            report.finished_at = Some(Utc::now());
            return Ok(report);
        }

        dispatch!(
            level = INFO,
            found = batch.len(),
            max_concurrent = self.config.max_concurrent_deliveries,
            "Dispatching due jobs"
        );

        let mut join_set: JoinSet<JobOutcome> = JoinSet::new();
        let mut pending = batch.into_iter();

        for job in pending
            .by_ref()
            .take(self.config.max_concurrent_deliveries)
        {
            join_set.spawn(process_job(Arc::clone(self), job, now));
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                // The job stays `processing`
                Err(e) => error!(error = %e, "Delivery task did not complete"),
            }

            if let Some(job) = pending.next() {
                join_set.spawn(process_job(Arc::clone(self), job, now));
            }
        }

        report.finished_at = Some(Utc::now());

        dispatch!(
            level = INFO,
            found = report.found,
            sent = report.sent,
            requeued = report.requeued,
            failed = report.failed,
            skipped = report.skipped,
            store_errors = report.store_errors,
            "Dispatch cycle complete"
        );

        Ok(report)
    }
}
