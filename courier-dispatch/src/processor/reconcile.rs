//! Re-apply outcome writes that failed in earlier cycles

use courier_common::tracing::{error, info, warn};

use super::DispatchProcessor;

impl DispatchProcessor {
    /// Re-apply every outstanding outcome write
    ///
    /// Successful writes and conflicts (the job was resolved by someone else)
    /// leave the queue. Entries that keep failing are dropped after
    /// `max_reconcile_attempts`; the job then stays `processing` until an
    /// operator intervenes.
    ///
    /// Returns the number of outcomes written.
    pub(crate) async fn reconcile_outcomes(&self) -> usize {
        let entries = self.reconcile.pending();
        if entries.is_empty() {
            return 0;
        }

        info!(count = entries.len(), "Re-applying outstanding job outcomes");

        let mut written = 0;
        for entry in entries {
            match self.apply(entry.job_id, entry.resolution).await {
                Ok(()) => {
                    info!(
                        job_id = %entry.job_id,
                        resolution = %entry.resolution,
                        attempt = entry.attempt_count + 1,
                        "Outcome written after retry"
                    );
                    self.reconcile.remove(entry.job_id);
                    written += 1;
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        job_id = %entry.job_id,
                        resolution = %entry.resolution,
                        error = %e,
                        "Job moved on before its outcome was written, dropping outcome"
                    );
                    self.reconcile.remove(entry.job_id);
                }
                Err(e) if entry.attempt_count >= self.config.max_reconcile_attempts => {
                    error!(
                        job_id = %entry.job_id,
                        resolution = %entry.resolution,
                        attempts = entry.attempt_count,
                        first_failure = %entry.first_failure.to_rfc3339(),
                        error = %e,
                        "CRITICAL: Failed to write job outcome after {} attempts - manual intervention required. \
                         The job remains in processing.",
                        entry.attempt_count
                    );
                    self.reconcile.remove(entry.job_id);
                }
                Err(e) => {
                    warn!(
                        job_id = %entry.job_id,
                        attempt = entry.attempt_count + 1,
                        error = %e,
                        "Failed to write job outcome, will retry next cycle"
                    );
                    self.reconcile.record_failure(entry.job_id, &e);
                }
            }
        }

        written
    }
}
