//! Fixed-cadence driver for dispatch cycles
//!
//! At most one cycle runs per scheduler. A tick (or manual trigger) that
//! arrives while a cycle is still running is skipped, not queued.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use courier_common::{
    Signal, internal,
    tracing::{debug, error, warn},
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::{sync::broadcast, task::JoinHandle, time::MissedTickBehavior};

use crate::{error::DeliveryError, processor::DispatchProcessor, types::CycleReport};

/// Point-in-time view of the scheduler, served on `/status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    /// The tick loop is active
    pub serving: bool,
    /// A cycle is currently in flight
    pub cycle_running: bool,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub ticks_skipped: u64,
    /// `None` until the first cycle has talked to the store
    pub store_reachable: Option<bool>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
    pub pending_reconcile: usize,
}

#[derive(Debug, Default)]
struct CycleHistory {
    store_reachable: Option<bool>,
    last_cycle_at: Option<DateTime<Utc>>,
    last_report: Option<CycleReport>,
    last_error: Option<String>,
}

/// Resets the running flag however the cycle task ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct Scheduler {
    processor: Arc<DispatchProcessor>,
    running: AtomicBool,
    serving: AtomicBool,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    ticks_skipped: AtomicU64,
    history: RwLock<CycleHistory>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(processor: Arc<DispatchProcessor>) -> Self {
        Self {
            processor,
            running: AtomicBool::new(false),
            serving: AtomicBool::new(false),
            cycles_completed: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            history: RwLock::new(CycleHistory::default()),
            in_flight: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn processor(&self) -> &Arc<DispatchProcessor> {
        &self.processor
    }

    /// Whether a cycle is in flight
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the tick loop is active
    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }

    /// Start a cycle in the background unless one is already running
    ///
    /// Returns `false` when the request was skipped.
    pub fn try_start_cycle(self: &Arc<Self>) -> bool {
        // Held until the handle is stored so a later cycle's handle is never
        // overwritten by this one
        let mut in_flight = self.in_flight.lock();

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Dispatch cycle still running, skipping tick");
            return false;
        }

        let scheduler = Arc::clone(self);
        *in_flight = Some(tokio::spawn(async move {
            let _guard = RunningGuard(&scheduler.running);
            let result = scheduler.processor.run_cycle().await;
            scheduler.record(result);
        }));
        true
    }

    fn record(&self, result: Result<CycleReport, DeliveryError>) {
        let mut history = self.history.write();
        history.last_cycle_at = Some(Utc::now());

        match result {
            Ok(report) => {
                self.cycles_completed.fetch_add(1, Ordering::Relaxed);
                history.store_reachable = Some(true);
                history.last_error = None;
                history.last_report = Some(report);
            }
            Err(e) => {
                self.cycles_failed.fetch_add(1, Ordering::Relaxed);
                if e.is_store_unavailable() {
                    warn!(error = %e, "Job store unavailable, cycle skipped");
                    history.store_reachable = Some(false);
                } else {
                    error!(error = %e, "Dispatch cycle failed");
                }
                history.last_error = Some(e.to_string());
            }
        }
    }

    /// Wait for the in-flight cycle, if any
    ///
    /// Returns `false` if it did not finish within `timeout`.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let handle = self.in_flight.lock().take();
        let Some(handle) = handle else {
            return true;
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "Dispatch cycle task did not complete");
                true
            }
            Err(_) => false,
        }
    }

    /// Snapshot for the status endpoint
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        let history = self.history.read();

        SchedulerStatus {
            serving: self.is_serving(),
            cycle_running: self.is_running(),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            store_reachable: history.store_reachable,
            last_cycle_at: history.last_cycle_at,
            last_report: history.last_report.clone(),
            last_error: history.last_error.clone(),
            pending_reconcile: self.processor.reconcile_queue().len(),
        }
    }

    /// Run the tick loop until a shutdown signal is received
    ///
    /// The first cycle starts immediately. On shutdown no further ticks are
    /// issued and the in-flight cycle is given `shutdown_timeout` to finish.
    /// Jobs it leaves claimed stay `processing`.
    ///
    /// # Errors
    ///
    /// Currently infallible; per-cycle errors are logged and recorded in the
    /// status instead.
    pub async fn serve(
        self: &Arc<Self>,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), DeliveryError> {
        let config = self.processor.config();
        internal!(
            level = INFO,
            "Scheduler starting with tick_interval={}s",
            config.tick_interval_secs
        );

        let mut ticker = tokio::time::interval(config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.serving.store(true, Ordering::SeqCst);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.try_start_cycle();
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Scheduler received shutdown signal");
                        }
                        Err(e) => {
                            error!("Scheduler shutdown channel error: {e}");
                        }
                    }
                    break;
                }
            }
        }

        self.serving.store(false, Ordering::SeqCst);

        let start = Instant::now();
        if self.is_running() {
            internal!(level = INFO, "Waiting for in-flight dispatch cycle to complete");
        }

        if self.wait_idle(config.shutdown_timeout()).await {
            internal!(
                "Scheduler idle after {:.1}s",
                start.elapsed().as_secs_f64()
            );
        } else {
            warn!(
                "Shutdown timeout exceeded, jobs claimed by the in-flight cycle remain in processing"
            );
        }

        internal!(level = INFO, "Scheduler shutdown complete");
        Ok(())
    }
}
