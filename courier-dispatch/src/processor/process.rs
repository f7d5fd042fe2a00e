//! Claim, deliver and resolve a single job

use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_common::{
    dispatch,
    tracing::{debug, error, warn},
};
use courier_store::{EmailJob, JobId, StoreError};

use super::DispatchProcessor;
use crate::{
    error::{DeliveryError, TemporaryError},
    sender::Envelope,
    types::{JobOutcome, Resolution},
};

/// Process one job of a batch (spawned as a task)
///
/// The claim comes first: a job is only ever delivered by the actor whose
/// conditional `pending -> processing` update succeeded. The claim re-checks
/// due-ness at the cycle's `now` and reports the attempt count it recorded,
/// which is the one the retry decision uses.
pub(super) async fn process_job(
    processor: Arc<DispatchProcessor>,
    job: EmailJob,
    now: DateTime<Utc>,
) -> JobOutcome {
    let attempt = match processor.store.mark_processing(job.id, now).await {
        Ok(Some(attempt)) => attempt,
        Ok(None) => {
            debug!(job_id = %job.id, "Job no longer claimable, skipping");
            return JobOutcome::Skipped;
        }
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Failed to claim job, leaving it pending");
            return JobOutcome::ClaimFailed;
        }
    };

    let envelope = Envelope::from(&job);

    let result = processor.deliver(&envelope).await;
    let resolution = processor.resolve(job.id, attempt, &result, Utc::now());

    let persisted = match processor.apply(job.id, resolution).await {
        Ok(()) => true,
        Err(e) => {
            processor.defer(job.id, resolution, &e);
            false
        }
    };

    JobOutcome::Resolved {
        resolution,
        persisted,
    }
}

impl DispatchProcessor {
    /// Deliver under the per-delivery timeout
    async fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        let timeout = self.config.delivery_timeout();

        match tokio::time::timeout(timeout, self.sender.deliver(envelope)).await {
            Ok(result) => result,
            Err(_) => Err(TemporaryError::Timeout(format!(
                "delivery did not complete within {}s",
                timeout.as_secs()
            ))
            .into()),
        }
    }

    /// Decide the next state for a claimed job
    pub(crate) fn resolve(
        &self,
        id: JobId,
        attempt: u32,
        result: &Result<(), DeliveryError>,
        now: DateTime<Utc>,
    ) -> Resolution {
        let policy = &self.config.retry;

        match result {
            Ok(()) => {
                dispatch!(level = INFO, job_id = %id, attempt, "Delivered");
                Resolution::Sent
            }
            Err(e) if e.is_temporary() && policy.should_retry(attempt) => {
                let retry_at = policy.next_attempt_at(attempt, now);
                warn!(
                    job_id = %id,
                    attempt,
                    remaining = policy.remaining_attempts(attempt),
                    retry_at = %retry_at.to_rfc3339(),
                    error = %e,
                    "Delivery failed, requeueing"
                );
                Resolution::Requeue { retry_at }
            }
            Err(e) if e.is_temporary() => {
                warn!(
                    job_id = %id,
                    attempt,
                    error = %e,
                    "Delivery failed, retry budget exhausted"
                );
                Resolution::Failed
            }
            Err(e) if e.is_system() => {
                error!(
                    job_id = %id,
                    attempt,
                    error = ?e,
                    "Unexpected delivery failure"
                );
                Resolution::Failed
            }
            Err(e) => {
                warn!(job_id = %id, attempt, error = %e, "Delivery failed permanently");
                Resolution::Failed
            }
        }
    }

    /// Write an outcome to the store
    pub(crate) async fn apply(&self, id: JobId, resolution: Resolution) -> Result<(), StoreError> {
        match resolution {
            Resolution::Sent => self.store.mark_sent(id).await,
            Resolution::Failed => self.store.mark_failed(id).await,
            Resolution::Requeue { retry_at } => self.store.requeue(id, retry_at).await,
        }
    }

    /// Keep an outcome whose write failed so a later cycle can re-apply it
    fn defer(&self, id: JobId, resolution: Resolution, error: &StoreError) {
        if error.is_conflict() {
            warn!(
                job_id = %id,
                %resolution,
                error = %error,
                "Job moved on before its outcome was written, dropping outcome"
            );
            return;
        }

        warn!(
            job_id = %id,
            %resolution,
            error = %error,
            "Failed to write outcome, queued for reconciliation"
        );
        self.reconcile.add_failed_write(id, resolution, error);
    }
}
