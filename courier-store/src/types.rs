use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Identifier of a row in the `scheduled_emails` table
///
/// Ordering follows the numeric id, which is the tie-break used when two jobs
/// share a `scheduled_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery state of a job, stored as text in the `status` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be picked up once due
    Pending,
    /// Claimed by a dispatcher, delivery in flight
    Processing,
    /// Delivered
    Sent,
    /// Permanently failed
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// `sent` and `failed` are never left again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::Corrupt(format!("unknown job status '{other}'"))),
        }
    }
}

/// A scheduled email, as read from the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub id: JobId,
    pub to_address: String,
    pub subject: String,
    pub body: String,
    /// The job becomes due once the wall clock passes this instant
    pub scheduled_time: DateTime<Utc>,
    pub status: JobStatus,
    /// Delivery attempts made so far; every successful claim counts as one
    pub attempt_count: u32,
    /// Retry-not-before instant written when a failed attempt is requeued
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl EmailJob {
    /// A fresh `pending` job with no attempts
    pub fn pending(
        id: impl Into<JobId>,
        to_address: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            to_address: to_address.into(),
            subject: subject.into(),
            body: body.into(),
            scheduled_time,
            status: JobStatus::Pending,
            attempt_count: 0,
            next_attempt_at: None,
        }
    }

    /// Whether this job should be picked up by a cycle running at `now`
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending
            && self.scheduled_time <= now
            && self.next_attempt_at.is_none_or(|at| at <= now)
    }
}
