#![allow(dead_code)]

pub mod mock_server;
pub mod sender;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use courier_dispatch::{DispatchConfig, DispatchProcessor, MailSender, RetryPolicy};
use courier_store::{EmailJob, JobStore};

/// A pending job for `user{id}@example.com`
pub fn job(id: i64, scheduled_time: DateTime<Utc>) -> EmailJob {
    EmailJob::pending(
        id,
        recipient(id),
        format!("Reminder #{id}"),
        "Your appointment is tomorrow.",
        scheduled_time,
    )
}

pub fn recipient(id: i64) -> String {
    format!("user{id}@example.com")
}

/// `count` jobs due in the past, oldest first by id
pub fn due_jobs(count: i64) -> Vec<EmailJob> {
    let now = Utc::now();
    (1..=count)
        .map(|id| job(id, now - Duration::minutes(count - id + 1)))
        .collect()
}

/// Dispatch settings for tests: deterministic backoff and a short timeout
pub fn config() -> DispatchConfig {
    DispatchConfig {
        tick_interval_secs: 1,
        delivery_timeout_secs: 1,
        shutdown_timeout_secs: 2,
        retry: RetryPolicy {
            retry_jitter_factor: 0.0,
            ..RetryPolicy::default()
        },
        ..DispatchConfig::default()
    }
}

pub fn processor(
    config: DispatchConfig,
    store: Arc<dyn JobStore>,
    sender: Arc<dyn MailSender>,
) -> Arc<DispatchProcessor> {
    Arc::new(DispatchProcessor::new(config, store, sender).expect("valid config"))
}
