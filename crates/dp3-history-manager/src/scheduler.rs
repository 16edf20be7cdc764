//! Scheduler adapter: binds a cadence to a housekeeping job and enforces
//! `coalesce=true, max_instances=1`, honoring the `worker_index == 0`
//! single-runner guard.
//!
//! The cron-like scheduler implementation itself is an external
//! collaborator; this adapter is the thin binding layer between it and
//! the housekeeping jobs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// The only cadence shape the History Manager ever registers: fire every
/// `n` minutes (`entity_management.tick_rate` / `datapoint_cleaning.tick_rate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub every_minutes: u32,
}

impl Cadence {
    pub fn every_minutes(n: u32) -> Self {
        Self { every_minutes: n }
    }

    fn as_duration(self) -> tokio::time::Duration {
        tokio::time::Duration::from_secs(u64::from(self.every_minutes) * 60)
    }
}

type BoxedJob = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// A tick-based scheduler adapter. Jobs registered on a `TickScheduler`
/// only actually run once `start()` is called with `worker_index == 0`;
/// other workers hold a no-op scheduler.
pub struct TickScheduler {
    worker_index: u32,
    jobs: Vec<(&'static str, Cadence, BoxedJob)>,
}

impl TickScheduler {
    pub fn new(worker_index: u32) -> Self {
        Self { worker_index, jobs: Vec::new() }
    }

    /// Register `job` to run on `cadence`. Mirrors the original
    /// `Scheduler.register(callable, ..., timezone="UTC")` contract,
    /// collapsed to the minute-interval shape actually used.
    pub fn register<F, Fut>(&mut self, name: &'static str, cadence: Cadence, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.jobs.push((name, cadence, Box::new(move || Box::pin(job()))));
    }

    /// Spawn a tick loop per registered job. No-op if `worker_index != 0`
    /// — housekeeping jobs run only on worker index 0.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        if self.worker_index != 0 {
            tracing::debug!(
                worker_index = self.worker_index,
                "history management will not be active in this worker instance to avoid race conditions"
            );
            return Vec::new();
        }

        self.jobs
            .into_iter()
            .map(|(name, cadence, job)| {
                let job = Arc::new(job);
                let in_flight = Arc::new(Mutex::new(()));
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(cadence.as_duration());
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    loop {
                        interval.tick().await;
                        // coalesce=true, max_instances=1: skip this tick if the
                        // previous run is still in flight rather than queuing it.
                        let Ok(_guard) = in_flight.clone().try_lock_owned() else {
                            tracing::warn!(job = name, "skipping tick, previous run still in flight");
                            continue;
                        };
                        job().await;
                    }
                })
            })
            .collect()
    }
}
