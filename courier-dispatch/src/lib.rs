//! Dispatch engine for scheduled email jobs
//!
//! - [`DispatchProcessor`]: one cycle selects a bounded batch of due jobs,
//!   claims each, delivers it and writes the outcome back
//! - [`MailSender`]: the transport seam, with [`SmtpMailSender`] over lettre
//! - [`Scheduler`]: runs cycles at a fixed cadence without overlap
//! - [`RetryPolicy`]: backoff for retryable failures

pub mod error;
pub mod policy;
pub mod processor;
pub mod queue;
pub mod scheduler;
pub mod sender;
pub mod types;

pub use error::{DeliveryError, PermanentError, SystemError, TemporaryError};
pub use policy::RetryPolicy;
pub use processor::{DispatchConfig, DispatchProcessor};
pub use queue::{ReconcileEntry, ReconcileQueue};
pub use scheduler::{Scheduler, SchedulerStatus};
pub use sender::{Envelope, MailSender, MailerConfig, SmtpMailSender, TlsMode};
pub use types::{CycleReport, JobOutcome, Resolution};
