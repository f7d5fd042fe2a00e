use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The outcome decided for a claimed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Delivered; the job becomes `sent`
    Sent,
    /// Terminal failure; the job becomes `failed`
    Failed,
    /// Retryable failure; the job returns to `pending` until `retry_at`
    Requeue { retry_at: DateTime<Utc> },
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => f.write_str("sent"),
            Self::Failed => f.write_str("failed"),
            Self::Requeue { retry_at } => write!(f, "requeue until {}", retry_at.to_rfc3339()),
        }
    }
}

/// What happened to one job of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Another actor claimed or resolved the job first
    Skipped,
    /// The claim itself could not reach the store; the job was left untouched
    ClaimFailed,
    /// The job was claimed and delivered (or not). `persisted` is false when
    /// the outcome write failed and was handed to the reconcile queue.
    Resolved {
        resolution: Resolution,
        persisted: bool,
    },
}

/// Summary of a single dispatch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Due jobs returned by the store
    pub found: usize,
    /// Jobs this cycle won the claim for
    pub claimed: usize,
    /// Jobs lost to another actor
    pub skipped: usize,
    pub sent: usize,
    pub requeued: usize,
    pub failed: usize,
    /// Claims or outcome writes that failed against the store
    pub store_errors: usize,
    /// Outcomes from earlier cycles re-applied at the start of this one
    pub reconciled: usize,
}

impl CycleReport {
    pub(crate) fn started(now: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(now),
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::ClaimFailed => self.store_errors += 1,
            JobOutcome::Resolved {
                resolution,
                persisted,
            } => {
                self.claimed += 1;
                match resolution {
                    Resolution::Sent => self.sent += 1,
                    Resolution::Failed => self.failed += 1,
                    Resolution::Requeue { .. } => self.requeued += 1,
                }
                if !persisted {
                    self.store_errors += 1;
                }
            }
        }
    }

    /// Whether the cycle found anything to do
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.found == 0 && self.reconciled == 0
    }
}
