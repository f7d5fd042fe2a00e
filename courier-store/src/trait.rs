use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{EmailJob, JobId};

/// Narrow view of the scheduled-email queue used by the dispatcher
///
/// Implementations own no delivery logic; they only select and transition
/// rows. Every transition is conditional on the current status so that
/// several dispatcher processes can share one table.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug {
    /// Jobs that are `pending`, scheduled at or before `now`, and not held back
    /// by a retry delay; earliest `scheduled_time` first, ties broken by id,
    /// at most `limit` of them. Never mutates.
    ///
    /// # Errors
    /// [`crate::StoreError::Unavailable`] if the store cannot be reached
    async fn fetch_due_batch(&self, now: DateTime<Utc>, limit: usize) -> crate::Result<Vec<EmailJob>>;

    /// Claim a job: `pending -> processing`, counting one more attempt.
    ///
    /// The claim only succeeds while the job is still due at `now`, so a job
    /// that another process requeued after this batch was fetched stays held
    /// back until its retry time. Returns the attempt count including this
    /// attempt, or `None` when the job is no longer claimable.
    ///
    /// # Errors
    /// If the store cannot be reached, or the job does not exist
    async fn mark_processing(&self, id: JobId, now: DateTime<Utc>) -> crate::Result<Option<u32>>;

    /// `processing -> sent`. Re-applying to a job already `sent` is a no-op.
    ///
    /// # Errors
    /// If the store cannot be reached, or the job is in any other state
    async fn mark_sent(&self, id: JobId) -> crate::Result<()>;

    /// `processing -> failed`. Re-applying to a job already `failed` is a no-op.
    ///
    /// # Errors
    /// If the store cannot be reached, or the job is in any other state
    async fn mark_failed(&self, id: JobId) -> crate::Result<()>;

    /// `processing -> pending`, not eligible again before `retry_at`.
    ///
    /// # Errors
    /// If the store cannot be reached, or the job is not `processing`
    async fn requeue(&self, id: JobId, retry_at: DateTime<Utc>) -> crate::Result<()>;
}
