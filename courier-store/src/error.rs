//! Error types for the courier-store crate.

use thiserror::Error;

use crate::{JobId, JobStatus};

/// Top-level job store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached (connection refused, pool
    /// exhausted, network timeout).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// No job with this id exists.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// The job is not in a state that allows the requested transition.
    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// A row could not be decoded into a job.
    #[error("Corrupt job row: {0}")]
    Corrupt(String),

    /// The store rejected a query for a reason other than connectivity.
    #[error("Query failed: {0}")]
    Query(String),

    /// Invalid store configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether the failure is about reaching the store rather than about the
    /// job itself. Such writes are worth repeating later.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Whether the job has moved on without us; repeating the write will
    /// never succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidTransition { .. })
    }
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Io(e) => Self::Unavailable(format!("I/O error: {e}")),
            sqlx::Error::Tls(e) => Self::Unavailable(format!("TLS error: {e}")),
            sqlx::Error::PoolTimedOut => {
                Self::Unavailable("timed out acquiring a connection".to_string())
            }
            sqlx::Error::PoolClosed => Self::Unavailable("connection pool closed".to_string()),
            sqlx::Error::WorkerCrashed => {
                Self::Unavailable("connection worker crashed".to_string())
            }
            sqlx::Error::Configuration(e) => Self::Configuration(e.to_string()),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Corrupt(format!("column {index}: {source}"))
            }
            sqlx::Error::Decode(e) => Self::Corrupt(e.to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}
