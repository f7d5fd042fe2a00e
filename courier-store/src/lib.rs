//! Job store adapter for the scheduled-email queue
//!
//! The dispatcher only ever talks to the queue through the [`JobStore`]
//! trait: a due-batch query, the conditional claim, and the outcome writes.
//! Backends:
//! - [`PostgresJobStore`]: the `scheduled_emails` table
//! - [`MemoryJobStore`]: in-process table for development and tests
//! - [`TestJobStore`]: memory store with failure injection

pub mod backends;
pub mod config;
pub mod error;
pub mod r#trait;
pub mod types;

pub use backends::{MemoryJobStore, PostgresJobStore, TestJobStore};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use r#trait::JobStore;
pub use types::{EmailJob, JobId, JobStatus};
