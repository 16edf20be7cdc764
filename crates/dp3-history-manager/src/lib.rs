//! History Manager: ingest reconciliation, housekeeping, the scheduler
//! adapter, and the update planner.

pub mod collaborators;
pub mod history_manager;
pub mod housekeeping;
pub mod ingest;
pub mod scheduler;
pub mod update_planner;

pub use collaborators::{EntityDatabase, EntityRecord, RangeQuery, RedundantFilter, SortOrder, TaskQueueWriter};
pub use history_manager::{HistoryManager, HistoryManagerContext, HousekeepingConfig};
pub use housekeeping::AttrSpecMap;
