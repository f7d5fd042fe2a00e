//! Scripted `MailSender` double

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_dispatch::{
    DeliveryError, Envelope, MailSender, PermanentError, SystemError, TemporaryError,
};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// What a delivery to a given recipient does
#[derive(Debug, Clone)]
pub enum Behaviour {
    Deliver,
    /// 4xx-style failure
    Temporary,
    /// Rejected credentials
    AuthFailure,
    /// 5xx-style failure
    Permanent,
    System,
    /// Never completes
    Hang,
    /// Completes after a delay
    Delay(Duration),
    /// Waits for [`ScriptedSender::release`] before delivering
    Block,
}

#[derive(Debug)]
pub struct ScriptedSender {
    default: Behaviour,
    script: Mutex<HashMap<String, Behaviour>>,
    delivered: Mutex<Vec<Envelope>>,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Semaphore,
}

impl Default for ScriptedSender {
    fn default() -> Self {
        Self::new(Behaviour::Deliver)
    }
}

impl ScriptedSender {
    pub fn new(default: Behaviour) -> Self {
        Self {
            default,
            script: Mutex::new(HashMap::new()),
            delivered: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        }
    }

    pub fn shared(default: Behaviour) -> Arc<Self> {
        Arc::new(Self::new(default))
    }

    /// Override the behaviour for one recipient
    pub fn on(&self, to: &str, behaviour: Behaviour) {
        self.script.lock().insert(to.to_string(), behaviour);
    }

    /// Let `count` blocked deliveries proceed
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Envelopes that were delivered successfully, in completion order
    pub fn delivered(&self) -> Vec<Envelope> {
        self.delivered.lock().clone()
    }

    pub fn delivered_to(&self) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .map(|envelope| envelope.to.clone())
            .collect()
    }

    /// Every call to `deliver`, whatever the outcome
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Highest number of deliveries observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn behaviour_for(&self, to: &str) -> Behaviour {
        self.script
            .lock()
            .get(to)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    async fn perform(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        match self.behaviour_for(&envelope.to) {
            Behaviour::Deliver => {}
            Behaviour::Temporary => {
                return Err(TemporaryError::SmtpTemporary(
                    "451 4.3.0 Try again later".to_string(),
                )
                .into());
            }
            Behaviour::AuthFailure => {
                return Err(PermanentError::AuthenticationFailed(
                    "535 5.7.8 Authentication credentials invalid".to_string(),
                )
                .into());
            }
            Behaviour::Permanent => {
                return Err(PermanentError::InvalidRecipient(
                    "550 5.1.1 User unknown".to_string(),
                )
                .into());
            }
            Behaviour::System => {
                return Err(SystemError::Internal("unexpected reply".to_string()).into());
            }
            Behaviour::Hang => {
                std::future::pending::<()>().await;
            }
            Behaviour::Delay(delay) => tokio::time::sleep(delay).await,
            Behaviour::Block => {
                if let Ok(permit) = self.gate.acquire().await {
                    permit.forget();
                }
            }
        }

        self.delivered.lock().push(envelope.clone());
        Ok(())
    }
}

#[async_trait]
impl MailSender for ScriptedSender {
    async fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let result = self.perform(envelope).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
