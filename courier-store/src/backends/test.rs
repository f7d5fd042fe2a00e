use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use super::memory::MemoryJobStore;
use crate::{EmailJob, JobId, JobStatus, StoreError, r#trait::JobStore};

/// Memory store with failure injection and synchronisation hooks
///
/// Fetches and outcome writes can be made to fail with
/// [`StoreError::Unavailable`] to exercise the dispatcher's degraded paths,
/// and tests can wait until a number of jobs have reached a terminal state.
#[derive(Debug, Clone, Default)]
pub struct TestJobStore {
    pub(crate) inner: MemoryJobStore,
    notify: Arc<Notify>,
    fail_fetch: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    fetch_calls: Arc<AtomicUsize>,
    claim_calls: Arc<AtomicUsize>,
}

impl TestJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table
    pub fn insert(&self, job: EmailJob) {
        self.inner.insert(job);
    }

    #[must_use]
    pub fn get(&self, id: JobId) -> Option<EmailJob> {
        self.inner.get(id)
    }

    #[must_use]
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.inner.get(id).map(|job| job.status)
    }

    #[must_use]
    pub fn count(&self, status: JobStatus) -> usize {
        self.inner.count(status)
    }

    /// Make `fetch_due_batch` fail until reset
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make `mark_sent`, `mark_failed` and `requeue` fail until reset
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `expected` jobs are `sent` or `failed`
    ///
    /// # Errors
    /// Returns an error if the timeout is reached first
    pub async fn wait_for_resolved(&self, expected: usize, timeout: Duration) -> crate::Result<()> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                let resolved =
                    self.inner.count(JobStatus::Sent) + self.inner.count(JobStatus::Failed);
                if resolved >= expected {
                    return;
                }
                notified.await;
            }
        })
        .await
        .map_err(|e| StoreError::Internal(format!("Timeout waiting for resolved jobs: {e}")))
    }

    fn check_writes(&self) -> crate::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for TestJobStore {
    async fn fetch_due_batch(&self, now: DateTime<Utc>, limit: usize) -> crate::Result<Vec<EmailJob>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected fetch failure".to_string()));
        }
        self.inner.fetch_due_batch(now, limit).await
    }

    async fn mark_processing(&self, id: JobId, now: DateTime<Utc>) -> crate::Result<Option<u32>> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_processing(id, now).await
    }

    async fn mark_sent(&self, id: JobId) -> crate::Result<()> {
        self.check_writes()?;
        self.inner.mark_sent(id).await?;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn mark_failed(&self, id: JobId) -> crate::Result<()> {
        self.check_writes()?;
        self.inner.mark_failed(id).await?;
        self.notify.notify_waiters();
        Ok(())
    }

    async fn requeue(&self, id: JobId, retry_at: DateTime<Utc>) -> crate::Result<()> {
        self.check_writes()?;
        self.inner.requeue(id, retry_at).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_fetch_failure_is_unavailable() {
        let store = TestJobStore::new();
        store.set_fail_fetch(true);

        let err = store.fetch_due_batch(Utc::now(), 5).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(store.fetch_calls(), 1);

        store.set_fail_fetch(false);
        assert!(store.fetch_due_batch(Utc::now(), 5).await.is_ok());
    }

    #[tokio::test]
    async fn injected_write_failure_leaves_job_processing() {
        let store = TestJobStore::new();
        store.insert(EmailJob::pending(1, "a@example.com", "s", "b", Utc::now()));
        let claimed = store.mark_processing(JobId::new(1), Utc::now()).await.expect("claim");
        assert_eq!(claimed, Some(1));

        store.set_fail_writes(true);
        assert!(store.mark_sent(JobId::new(1)).await.is_err());
        assert_eq!(store.status(JobId::new(1)), Some(JobStatus::Processing));

        store.set_fail_writes(false);
        store.mark_sent(JobId::new(1)).await.expect("sent");
        assert_eq!(store.status(JobId::new(1)), Some(JobStatus::Sent));
    }

    #[tokio::test]
    async fn wait_for_resolved_times_out() {
        let store = TestJobStore::new();
        let result = store
            .wait_for_resolved(1, Duration::from_millis(20))
            .await;
        assert!(result.is_err());
    }
}
