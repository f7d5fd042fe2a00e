use std::{fmt, time::Duration};

use async_trait::async_trait;
use courier_common::internal;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use serde::Deserialize;

use super::{Envelope, MailSender};
use crate::error::{DeliveryError, SystemError};

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    587
}

fn default_from() -> String {
    "courier@localhost".to_string()
}

const fn default_timeout() -> u64 {
    30
}

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum TlsMode {
    /// Plain text only
    None,
    /// Upgrade with STARTTLS when the server offers it
    #[default]
    Opportunistic,
    /// Require STARTTLS
    StartTls,
    /// TLS from the first byte (usually port 465)
    Wrapper,
}

/// SMTP submission settings
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct MailerConfig {
    /// Submission host; `MAIL_HOST` overrides it
    #[serde(default = "default_host")]
    pub host: String,

    /// Submission port; `MAIL_PORT` overrides it
    #[serde(default = "default_port")]
    pub port: u16,

    /// `MAIL_USER` overrides it
    #[serde(default)]
    pub username: Option<String>,

    /// `MAIL_PASS` overrides it
    #[serde(default)]
    pub password: Option<String>,

    /// Sender identity on every message; `MAIL_FROM` overrides it, and
    /// `MAIL_USER` stands in while it is left at the default
    #[serde(default = "default_from")]
    pub from: String,

    #[serde(default)]
    pub tls: TlsMode,

    /// Transport-level timeout for each SMTP command (in seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates (for testing only)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            from: default_from(),
            tls: TlsMode::default(),
            timeout_secs: default_timeout(),
            accept_invalid_certs: false,
        }
    }
}

impl fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("tls", &self.tls)
            .field("timeout_secs", &self.timeout_secs)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl MailerConfig {
    fn tls(&self) -> Result<Tls, DeliveryError> {
        if self.tls == TlsMode::None {
            return Ok(Tls::None);
        }

        let parameters = TlsParameters::builder(self.host.clone())
            .dangerous_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| SystemError::Configuration(format!("invalid TLS parameters: {e}")))?;

        Ok(match self.tls {
            TlsMode::None => Tls::None,
            TlsMode::Opportunistic => Tls::Opportunistic(parameters),
            TlsMode::StartTls => Tls::Required(parameters),
            TlsMode::Wrapper => Tls::Wrapper(parameters),
        })
    }
}

/// [`MailSender`] over an SMTP submission endpoint
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    endpoint: String,
}

impl fmt::Debug for SmtpMailSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailSender")
            .field("endpoint", &self.endpoint)
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpMailSender {
    /// Build the transport. No connection is made until the first delivery.
    ///
    /// # Errors
    /// If the sender address or the TLS parameters are invalid
    pub fn new(config: &MailerConfig) -> Result<Self, DeliveryError> {
        let from = config.from.parse::<Mailbox>().map_err(|e| {
            SystemError::Configuration(format!("invalid sender address '{}': {e}", config.from))
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(config.tls()?)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let Some(username) = &config.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        let endpoint = format!("{}:{}", config.host, config.port);
        internal!(
            "SMTP sender configured for {endpoint} (tls={:?}, authenticated={})",
            config.tls,
            config.username.is_some()
        );

        Ok(Self {
            transport: builder.build(),
            from,
            endpoint,
        })
    }

    /// The `host:port` messages are submitted to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_message(&self, envelope: &Envelope) -> Result<Message, DeliveryError> {
        let to = envelope.to.parse::<Mailbox>()?;

        Ok(Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(envelope.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(envelope.body.clone())?)
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        let message = self.build_message(envelope)?;
        self.transport.send(message).await?;
        Ok(())
    }
}
