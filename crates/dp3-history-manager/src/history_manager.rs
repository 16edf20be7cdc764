//! The `HistoryManager` itself: construction, scheduler registration, and
//! the public ingest/housekeeping entry points.
//!
//! Collaborators are passed in once at construction
//! (`HistoryManagerContext`) instead of reached through a process-wide
//! global handle.

use std::sync::Arc;

use dp3_history_core::{AttrSpec, Datapoint, Dp3Error};

use crate::collaborators::{EntityDatabase, TaskQueueWriter};
use crate::housekeeping::{self, AttrSpecMap};
use crate::ingest;
use crate::scheduler::{Cadence, TickScheduler};

/// Tick-rate configuration for the two housekeeping jobs, in minutes.
#[derive(Debug, Clone, Copy)]
pub struct HousekeepingConfig {
    pub entity_management_tick_minutes: u32,
    pub datapoint_cleaning_tick_minutes: u32,
}

/// The dependency-injected context a `HistoryManager` is built from.
pub struct HistoryManagerContext {
    pub db: Arc<dyn EntityDatabase>,
    pub task_queue: Arc<dyn TaskQueueWriter>,
    pub attr_spec: Arc<AttrSpecMap>,
    pub worker_index: u32,
    pub housekeeping: HousekeepingConfig,
}

pub struct HistoryManager {
    ctx: Arc<HistoryManagerContext>,
}

impl HistoryManager {
    /// Construct a `HistoryManager`. Does not itself start housekeeping —
    /// call `spawn_housekeeping` once the async runtime is up.
    pub fn new(ctx: HistoryManagerContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    /// Register and start the two housekeeping jobs on a `TickScheduler`.
    /// A no-op on any worker other than 0.
    pub fn spawn_housekeeping(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let mut scheduler = TickScheduler::new(self.ctx.worker_index);

        let ctx = self.ctx.clone();
        scheduler.register(
            "manage_current_entity_values",
            Cadence::every_minutes(self.ctx.housekeeping.entity_management_tick_minutes),
            move || {
                let ctx = ctx.clone();
                async move {
                    tracing::debug!("updating confidence and deleting expired attribute values");
                    housekeeping::manage_current_entity_values(ctx.db.as_ref(), ctx.task_queue.as_ref(), &ctx.attr_spec)
                        .await;
                }
            },
        );

        let ctx = self.ctx.clone();
        scheduler.register(
            "delete_old_datapoints",
            Cadence::every_minutes(self.ctx.housekeeping.datapoint_cleaning_tick_minutes),
            move || {
                let ctx = ctx.clone();
                async move {
                    tracing::debug!("deleting old records");
                    housekeeping::delete_old_datapoints(ctx.db.as_ref(), &ctx.attr_spec).await;
                }
            },
        );

        scheduler.start()
    }

    /// Reconcile an incoming datapoint for `(etype, attr_id)` against history.
    pub async fn process_datapoint(&self, etype: &str, attr_id: &str, data: Datapoint) -> Result<(), Dp3Error> {
        let attr_spec = self.attr_spec_for(etype, attr_id)?;
        ingest::process_datapoint(self.ctx.db.as_ref(), attr_spec, etype, attr_id, data).await
    }

    fn attr_spec_for(&self, etype: &str, attr_id: &str) -> Result<&AttrSpec, Dp3Error> {
        self.ctx
            .attr_spec
            .get(etype)
            .and_then(|attrs| attrs.get(attr_id))
            .ok_or_else(|| Dp3Error::InvalidSpec(format!("no attribute spec for {etype}/{attr_id}")))
    }
}
