//! Typed error handling for dispatch operations.
//!
//! Delivery failures are split into:
//! - Permanent failures (5xx replies, bad recipients, rejected credentials) - mark failed
//! - Temporary failures (4xx replies, connection problems, timeouts) - requeue with backoff
//! - System errors - unexpected problems, mark failed and log with full context

use courier_store::StoreError;
use thiserror::Error;

/// SMTP reply codes that mean the submission credentials were not accepted.
const AUTH_FAILURE_CODES: [u16; 4] = [530, 534, 535, 538];

/// Top-level delivery error type.
///
/// The variant decides what happens to the job: only [`Self::Temporary`] is
/// ever retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Permanent failure that should not be retried.
    #[error("Permanent failure: {0}")]
    Permanent(#[from] PermanentError),

    /// Temporary failure that can be retried with backoff.
    #[error("Temporary failure: {0}")]
    Temporary(#[from] TemporaryError),

    /// System-level error.
    #[error("System error: {0}")]
    System(#[from] SystemError),
}

/// Permanent errors that should not be retried.
#[derive(Debug, Error)]
pub enum PermanentError {
    /// Recipient address is malformed or was rejected by the server.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    /// Message was rejected by the server.
    #[error("Message rejected: {0}")]
    MessageRejected(String),

    /// SMTP authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The message could not be built from the job's fields.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

/// Temporary errors that should be retried with exponential backoff.
#[derive(Debug, Error)]
pub enum TemporaryError {
    /// Failed to establish or keep a connection to the mail server.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The delivery did not finish in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Server returned a temporary failure code.
    #[error("Temporary SMTP error: {0}")]
    SmtpTemporary(String),
}

/// System-level errors that indicate internal problems.
#[derive(Debug, Error)]
pub enum SystemError {
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The job store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Other internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeliveryError {
    /// Returns `true` if this error is temporary and should be retried.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Returns `true` if this error is permanent and should not be retried.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    /// Returns `true` if this is a system error.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }

    /// Returns `true` if the job store could not be reached.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::System(SystemError::Store(e)) if e.is_unavailable())
    }
}

impl From<StoreError> for DeliveryError {
    fn from(error: StoreError) -> Self {
        Self::System(SystemError::Store(error))
    }
}

/// Numeric SMTP reply code carried by a transport error, if any.
fn reply_code(error: &lettre::transport::smtp::Error) -> Option<u16> {
    error
        .status()
        .and_then(|code| code.to_string().parse::<u16>().ok())
}

/// Classify a transport error.
///
/// - **4xx replies** → Temporary
/// - **530/534/535/538** → Permanent (authentication)
/// - **550-553 replies** → Permanent (recipient rejected)
/// - **other 5xx replies** → Permanent (message rejected)
/// - **timeouts, connection and TLS problems** → Temporary
/// - **client-side protocol errors** → System
impl From<lettre::transport::smtp::Error> for DeliveryError {
    fn from(error: lettre::transport::smtp::Error) -> Self {
        let code = reply_code(&error);

        if error.is_transient() {
            return Self::Temporary(TemporaryError::SmtpTemporary(error.to_string()));
        }

        if error.is_permanent() {
            return match code {
                Some(code) if AUTH_FAILURE_CODES.contains(&code) => {
                    Self::Permanent(PermanentError::AuthenticationFailed(error.to_string()))
                }
                Some(550..=553) => {
                    Self::Permanent(PermanentError::InvalidRecipient(error.to_string()))
                }
                _ => Self::Permanent(PermanentError::MessageRejected(error.to_string())),
            };
        }

        if error.is_timeout() {
            return Self::Temporary(TemporaryError::Timeout(error.to_string()));
        }

        if error.is_client() {
            return Self::System(SystemError::Internal(format!(
                "SMTP client error: {error}"
            )));
        }

        Self::Temporary(TemporaryError::ConnectionFailed(error.to_string()))
    }
}

impl From<lettre::address::AddressError> for DeliveryError {
    fn from(error: lettre::address::AddressError) -> Self {
        Self::Permanent(PermanentError::InvalidRecipient(error.to_string()))
    }
}

impl From<lettre::error::Error> for DeliveryError {
    fn from(error: lettre::error::Error) -> Self {
        Self::Permanent(PermanentError::MalformedMessage(error.to_string()))
    }
}
