use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{EmailJob, JobId, JobStatus, StoreError, r#trait::JobStore};

/// In-memory job table
///
/// Jobs live in a `BTreeMap` behind an `RwLock`. Every transition takes the
/// write lock for its check-and-set, which makes the claim atomic across
/// tasks sharing one store (clones share the same table).
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    pub(crate) jobs: Arc<RwLock<BTreeMap<JobId, EmailJob>>>,
}

impl MemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job, as an external producer would
    pub fn insert(&self, job: EmailJob) {
        self.jobs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(job.id, job);
    }

    /// Snapshot of a single job
    #[must_use]
    pub fn get(&self, id: JobId) -> Option<EmailJob> {
        self.jobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Snapshot of every job, ordered by id
    #[must_use]
    pub fn jobs(&self) -> Vec<EmailJob> {
        self.jobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Number of jobs currently in `status`
    #[must_use]
    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|job| job.status == status)
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move a `processing` job to a terminal status, tolerating a repeat of the
    /// same terminal write.
    fn resolve(&self, id: JobId, to: JobStatus) -> crate::Result<()> {
        let mut jobs = self.jobs.write()?;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        match job.status {
            JobStatus::Processing => {
                job.status = to;
                Ok(())
            }
            current if current == to => Ok(()),
            from => Err(StoreError::InvalidTransition { id, from, to }),
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn fetch_due_batch(&self, now: DateTime<Utc>, limit: usize) -> crate::Result<Vec<EmailJob>> {
        let mut due: Vec<EmailJob> = self
            .jobs
            .read()?
            .values()
            .filter(|job| job.is_due(now))
            .cloned()
            .collect();

        due.sort_by(|a, b| {
            a.scheduled_time
                .cmp(&b.scheduled_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        due.truncate(limit);

        Ok(due)
    }

    async fn mark_processing(&self, id: JobId, now: DateTime<Utc>) -> crate::Result<Option<u32>> {
        let mut jobs = self.jobs.write()?;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if !job.is_due(now) {
            return Ok(None);
        }

        job.status = JobStatus::Processing;
        job.attempt_count = job.attempt_count.saturating_add(1);
        Ok(Some(job.attempt_count))
    }

    async fn mark_sent(&self, id: JobId) -> crate::Result<()> {
        self.resolve(id, JobStatus::Sent)
    }

    async fn mark_failed(&self, id: JobId) -> crate::Result<()> {
        self.resolve(id, JobStatus::Failed)
    }

    async fn requeue(&self, id: JobId, retry_at: DateTime<Utc>) -> crate::Result<()> {
        let mut jobs = self.jobs.write()?;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if job.status != JobStatus::Processing {
            return Err(StoreError::InvalidTransition {
                id,
                from: job.status,
                to: JobStatus::Pending,
            });
        }

        job.status = JobStatus::Pending;
        job.next_attempt_at = Some(retry_at);
        Ok(())
    }
}
