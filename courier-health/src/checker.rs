//! Health logic over the running scheduler

use std::sync::Arc;

use courier_dispatch::{Scheduler, SchedulerStatus};

/// Answers probes from the scheduler's live state
#[derive(Debug, Clone)]
pub struct HealthChecker {
    scheduler: Arc<Scheduler>,
}

impl HealthChecker {
    #[must_use]
    pub const fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    /// If we can answer at all we are alive; a dead server is detected by
    /// the probe timing out.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        true
    }

    /// Ready while the tick loop runs and the store was reachable on the
    /// last cycle (or no cycle has run yet)
    #[must_use]
    pub fn is_ready(&self) -> bool {
        Self::ready_from(&self.scheduler.status())
    }

    pub(crate) const fn ready_from(status: &SchedulerStatus) -> bool {
        status.serving && !matches!(status.store_reachable, Some(false))
    }

    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    /// Start a cycle now through the scheduler's no-overlap guard
    pub fn trigger(&self) -> bool {
        self.scheduler.try_start_cycle()
    }
}
