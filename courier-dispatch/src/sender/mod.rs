//! Mail transport seam
//!
//! The dispatcher hands every claimed job to a [`MailSender`] and acts on the
//! classification of the returned [`DeliveryError`].

mod smtp;

use async_trait::async_trait;
use courier_store::{EmailJob, JobId};

pub use smtp::{MailerConfig, SmtpMailSender, TlsMode};

use crate::error::DeliveryError;

/// One outgoing message, built from a job's immutable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub job_id: JobId,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl From<&EmailJob> for Envelope {
    fn from(job: &EmailJob) -> Self {
        Self {
            job_id: job.id,
            to: job.to_address.clone(),
            subject: job.subject.clone(),
            body: job.body.clone(),
        }
    }
}

/// Delivers a single message
#[async_trait]
pub trait MailSender: Send + Sync + std::fmt::Debug {
    /// Deliver `envelope` once.
    ///
    /// # Errors
    /// A [`DeliveryError`] whose variant tells the caller whether the job may
    /// be attempted again.
    async fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError>;
}
