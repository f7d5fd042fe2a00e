//! Dispatch cycle engine

mod cycle;
mod process;
mod reconcile;

use std::{sync::Arc, time::Duration};

use courier_common::internal;
use courier_store::JobStore;
use serde::Deserialize;

use crate::{
    error::{DeliveryError, SystemError},
    policy::RetryPolicy,
    queue::ReconcileQueue,
    sender::MailSender,
};

const fn default_tick_interval() -> u64 {
    30
}

const fn default_batch_size() -> usize {
    5
}

const fn default_max_concurrent_deliveries() -> usize {
    4
}

const fn default_delivery_timeout() -> u64 {
    60
}

const fn default_shutdown_timeout() -> u64 {
    30
}

const fn default_max_reconcile_attempts() -> u32 {
    10
}

/// Dispatch settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DispatchConfig {
    /// How often the scheduler starts a cycle (in seconds)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Maximum number of due jobs taken per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Deliveries in flight at once within a cycle
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,

    /// Upper bound on a single delivery (in seconds); exceeding it counts as
    /// a temporary failure
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// How long shutdown waits for an in-flight cycle (in seconds)
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Failed outcome writes are retried this many times before being dropped
    #[serde(default = "default_max_reconcile_attempts")]
    pub max_reconcile_attempts: u32,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            batch_size: default_batch_size(),
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
            delivery_timeout_secs: default_delivery_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_reconcile_attempts: default_max_reconcile_attempts(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatchConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    #[must_use]
    pub const fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// # Errors
    /// If any setting would stop the dispatcher from making progress
    pub fn validate(&self) -> Result<(), SystemError> {
        if self.tick_interval_secs == 0 {
            return Err(SystemError::Configuration(
                "dispatch.tick_interval_secs must be at least 1".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(SystemError::Configuration(
                "dispatch.batch_size must be at least 1".to_string(),
            ));
        }

        if self.max_concurrent_deliveries == 0 {
            return Err(SystemError::Configuration(
                "dispatch.max_concurrent_deliveries must be at least 1".to_string(),
            ));
        }

        if self.delivery_timeout_secs == 0 {
            return Err(SystemError::Configuration(
                "dispatch.delivery_timeout_secs must be at least 1".to_string(),
            ));
        }

        self.retry.validate()
    }
}

/// Runs dispatch cycles against an injected store and sender
///
/// The processor is the only component that decides what state a job moves
/// to. It holds no per-job state between cycles apart from the reconcile
/// queue of outcome writes that did not reach the store.
#[derive(Debug)]
pub struct DispatchProcessor {
    pub(crate) config: DispatchConfig,
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) sender: Arc<dyn MailSender>,
    pub(crate) reconcile: ReconcileQueue,
}

impl DispatchProcessor {
    /// # Errors
    /// If the configuration is invalid
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn JobStore>,
        sender: Arc<dyn MailSender>,
    ) -> Result<Self, DeliveryError> {
        config.validate()?;

        internal!(
            "Dispatch processor configured with batch_size={}, max_concurrent_deliveries={}, delivery_timeout={}s, max_attempts={}",
            config.batch_size,
            config.max_concurrent_deliveries,
            config.delivery_timeout_secs,
            config.retry.max_attempts
        );

        Ok(Self {
            config,
            store,
            sender,
            reconcile: ReconcileQueue::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Outcome writes waiting to be re-applied
    #[must_use]
    pub const fn reconcile_queue(&self) -> &ReconcileQueue {
        &self.reconcile
    }
}
