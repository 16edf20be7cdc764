//! External collaborator contracts.
//!
//! These are the interfaces the History Manager consumes but does not
//! implement: the entity database driver, the task-queue writer, and the
//! typed record accessor. Implementations are dependency-injected into
//! `HistoryManager::new` rather than reached through process-wide globals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dp3_history_core::{Datapoint, Tag, Value};

/// Sort order for `get_datapoints_range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending by `t1`.
    AscByT1,
    /// Descending by `t2`.
    DescByT2,
}

/// `filter_redundant` tri-state: `true` excludes REDUNDANT, `false`
/// returns only REDUNDANT, `null`/`All` returns every tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedundantFilter {
    Exclude,
    Only,
    All,
}

/// A range query against the datapoint store for `(etype, attr, eid)`.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub etype: String,
    pub attr_id: String,
    pub eid: String,
    pub t1: Option<DateTime<Utc>>,
    pub t2: Option<DateTime<Utc>>,
    /// `true` = closed interval bounds; `false` = open-ended overlap test.
    pub closed_interval: bool,
    pub sort: SortOrder,
    pub filter_redundant: RedundantFilter,
    pub limit: Option<usize>,
}

impl RangeQuery {
    pub fn new(etype: impl Into<String>, attr_id: impl Into<String>, eid: impl Into<String>) -> Self {
        Self {
            etype: etype.into(),
            attr_id: attr_id.into(),
            eid: eid.into(),
            t1: None,
            t2: None,
            closed_interval: true,
            sort: SortOrder::AscByT1,
            filter_redundant: RedundantFilter::Exclude,
            limit: None,
        }
    }
}

/// The datapoint/entity store.
///
/// Implementations are thread-safe collaborators; the core holds no
/// in-process cache over them.
#[async_trait]
pub trait EntityDatabase: Send + Sync {
    async fn get_datapoints_range(&self, q: RangeQuery) -> Result<Vec<Datapoint>, String>;
    async fn create_datapoint(&self, etype: &str, attr_id: &str, dp: Datapoint) -> Result<(), String>;
    async fn rewrite_data_points(&self, etype: &str, attr_id: &str, dps: Vec<Datapoint>) -> Result<(), String>;
    async fn delete_multiple_records(&self, etype: &str, attr_id: &str, ids: Vec<String>) -> Result<(), String>;
    async fn delete_record(&self, etype: &str, attr_id: &str, id: &str) -> Result<(), String>;
    async fn delete_old_datapoints(
        &self,
        etype: &str,
        attr_id: &str,
        t_old: Option<DateTime<Utc>>,
        t_redundant: Option<DateTime<Utc>>,
        tag: Option<Tag>,
    ) -> Result<(), String>;
    async fn get_entities(&self, etype: &str) -> Result<Vec<String>, String>;
    async fn get_entities_with_expired_values(&self, etype: &str, attr_id: &str) -> Result<Vec<String>, String>;
    /// Delegated single-value expiration. Returns the entities it
    /// actually touched.
    async fn unset_expired_values(
        &self,
        etype: &str,
        attr_id: &str,
        has_confidence: bool,
    ) -> Result<Vec<String>, String>;

    /// Load the typed slot state for `(etype, eid)` needed by housekeeping.
    async fn get_record(&self, etype: &str, eid: &str) -> Result<EntityRecord, String>;
    /// Commit staged writes for `(etype, eid)` (`push_changes_to_db`).
    async fn push_record(&self, etype: &str, eid: &str, record: EntityRecord) -> Result<(), String>;
}

/// Typed attribute slots on an entity's current-value record: `attr`,
/// `attr:c` (confidence), `attr:exp` (per-value expirations, multi-value
/// only).
#[derive(Debug, Clone, Default)]
pub struct EntityRecord {
    pub ts_added: Option<DateTime<Utc>>,
    pub single_values: std::collections::BTreeMap<String, Value>,
    pub single_confidence: std::collections::BTreeMap<String, f64>,
    pub multi_values: std::collections::BTreeMap<String, Vec<Value>>,
    pub multi_confidence: std::collections::BTreeMap<String, Vec<f64>>,
    pub multi_expiration: std::collections::BTreeMap<String, Vec<DateTime<Utc>>>,
}

/// Task-queue writer. Non-blocking, at-least-once delivery.
#[async_trait]
pub trait TaskQueueWriter: Send + Sync {
    async fn put_task(&self, etype: &str, eid: &str, events: Vec<String>);
}
