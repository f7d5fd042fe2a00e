use std::{future::Future, sync::Arc};

use anyhow::Context;
use courier_common::{Signal, internal, tracing};
use courier_dispatch::{DispatchConfig, DispatchProcessor, MailerConfig, Scheduler, SmtpMailSender};
use courier_health::{HealthChecker, HealthConfig, HealthServer};
use courier_store::StoreConfig;
use serde::Deserialize;
use tokio::sync::broadcast;

/// Top-level configuration, read from `courier.config.ron`
///
/// Every section is optional; an empty `Courier ()` runs an in-memory store
/// against `localhost:587`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Courier {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub mailer: MailerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate signal received, shutting down");
        }
    };

    Ok(())
}

impl Courier {
    /// Parse a RON configuration
    ///
    /// # Errors
    ///
    /// If the content is not a valid `Courier` configuration
    pub fn from_ron(content: &str) -> anyhow::Result<Self> {
        ron::from_str(content).context("Invalid courier configuration")
    }

    /// Apply the process environment on top of the parsed configuration
    ///
    /// # Errors
    ///
    /// If an override has an unparseable value
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up through `lookup`
    ///
    /// `DATABASE_URL` switches the store to Postgres at that URL, keeping any
    /// configured pool settings. Without `MAIL_FROM`, a sender address still
    /// at its default is replaced by `MAIL_USER`.
    ///
    /// # Errors
    ///
    /// If `MAIL_PORT` is not a valid port number
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(url) = lookup("DATABASE_URL") {
            self.store = std::mem::take(&mut self.store).with_url(url);
        }
        if let Some(host) = lookup("MAIL_HOST") {
            self.mailer.host = host;
        }
        if let Some(port) = lookup("MAIL_PORT") {
            self.mailer.port = port
                .parse()
                .with_context(|| format!("MAIL_PORT is not a valid port: {port}"))?;
        }
        if let Some(user) = lookup("MAIL_USER") {
            if self.mailer.from == MailerConfig::default().from {
                self.mailer.from.clone_from(&user);
            }
            self.mailer.username = Some(user);
        }
        if let Some(pass) = lookup("MAIL_PASS") {
            self.mailer.password = Some(pass);
        }
        if let Some(from) = lookup("MAIL_FROM") {
            self.mailer.from = from;
        }
        if let Some(listen) = lookup("COURIER_LISTEN") {
            self.health.listen_address = listen;
        }

        Ok(())
    }

    /// Run until SIGINT or SIGTERM
    ///
    /// # Errors
    ///
    /// If any component fails to start
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` resolves, then shut every component down
    ///
    /// Start-up failures (configuration, store, transport, health listener)
    /// are returned before any cycle runs.
    ///
    /// # Errors
    ///
    /// If any component fails to start, or `signal` itself fails
    pub async fn run_until<F>(self, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        internal!(level = INFO, "Courier starting");

        let store = self
            .store
            .into_job_store()
            .await
            .context("Failed to initialise the job store")?;
        let sender = Arc::new(
            SmtpMailSender::new(&self.mailer).context("Failed to initialise the mail transport")?,
        );
        internal!(level = INFO, "Delivering through {}", sender.endpoint());

        let processor = DispatchProcessor::new(self.dispatch, store, sender)
            .context("Invalid dispatch configuration")?;
        let scheduler = Arc::new(Scheduler::new(Arc::new(processor)));

        let health = if self.health.enabled {
            let checker = Arc::new(HealthChecker::new(Arc::clone(&scheduler)));
            Some(HealthServer::new(&self.health, checker).await?)
        } else {
            internal!("Health server disabled");
            None
        };

        let (shutdown, _) = broadcast::channel(64);

        let scheduling = {
            let scheduler = Arc::clone(&scheduler);
            let receiver = shutdown.subscribe();
            tokio::spawn(async move { scheduler.serve(receiver).await })
        };
        let health = health.map(|server| tokio::spawn(server.serve(shutdown.subscribe())));

        internal!(level = INFO, "Courier running");
        let ret = signal.await;

        internal!(level = INFO, "Shutting down...");
        if shutdown.send(Signal::Shutdown).is_err() {
            tracing::debug!("No component was listening for shutdown");
        }

        scheduling
            .await
            .context("Scheduler task failed")?
            .context("Scheduler failed")?;
        if let Some(health) = health {
            health
                .await
                .context("Health server task failed")?
                .context("Health server failed")?;
        }

        internal!(level = INFO, "Shutdown complete");
        ret
    }
}
