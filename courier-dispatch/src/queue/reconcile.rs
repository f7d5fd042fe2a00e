//! Reconcile queue for outcome writes that did not reach the store
//!
//! After a delivery attempt the outcome is already decided; only the write is
//! outstanding. Entries are re-applied at the start of later cycles instead
//! of delivering the job again.

use chrono::{DateTime, Utc};
use courier_store::JobId;
use dashmap::DashMap;

use crate::types::Resolution;

/// An outcome waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileEntry {
    pub job_id: JobId,
    pub resolution: Resolution,
    /// Number of failed writes so far
    pub attempt_count: u32,
    pub first_failure: DateTime<Utc>,
    pub last_error: String,
}

/// Outstanding outcome writes keyed by job
#[derive(Debug, Default)]
pub struct ReconcileQueue {
    pub(crate) entries: DashMap<JobId, ReconcileEntry>,
}

impl ReconcileQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Record a failed outcome write
    pub fn add_failed_write(&self, job_id: JobId, resolution: Resolution, error: impl ToString) {
        self.entries.insert(
            job_id,
            ReconcileEntry {
                job_id,
                resolution,
                attempt_count: 1,
                first_failure: Utc::now(),
                last_error: error.to_string(),
            },
        );
    }

    /// Snapshot of every outstanding entry, oldest failure first
    #[must_use]
    pub fn pending(&self) -> Vec<ReconcileEntry> {
        let mut entries: Vec<ReconcileEntry> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|entry| (entry.first_failure, entry.job_id));
        entries
    }

    /// Count another failed write for `job_id`
    pub fn record_failure(&self, job_id: JobId, error: impl ToString) {
        if let Some(mut entry) = self.entries.get_mut(&job_id) {
            entry.attempt_count += 1;
            entry.last_error = error.to_string();
        }
    }

    /// Called after a successful write, a conflict, or when giving up
    pub fn remove(&self, job_id: JobId) {
        self.entries.remove(&job_id);
    }

    #[must_use]
    pub fn contains(&self, job_id: JobId) -> bool {
        self.entries.contains_key(&job_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
