//! In-memory reference implementation of `EntityDatabase` / `TaskQueueWriter`.
//!
//! This is **not** a production entity-database driver — that storage layer
//! is treated as an external collaborator. It exists so the collaborator
//! traits in `dp3-history-manager` are exercisable by tests and by the
//! `dp3-history-service` demo binary.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dp3_history_core::{Datapoint, Tag, Value};
use dp3_history_manager::{EntityDatabase, EntityRecord, RangeQuery, RedundantFilter, SortOrder, TaskQueueWriter};

type Key = (String, String, String); // (etype, attr_id, eid)
type EntityKey = (String, String); // (etype, eid)

#[derive(Default)]
pub struct InMemoryDatabase {
    datapoints: Mutex<BTreeMap<Key, Vec<Datapoint>>>,
    records: Mutex<BTreeMap<EntityKey, EntityRecord>>,
    single_expiration: Mutex<BTreeMap<(String, String, String), DateTime<Utc>>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a datapoint directly, bypassing `process_datapoint`. Used to
    /// set up test fixtures.
    pub fn seed_datapoint(&self, etype: &str, attr_id: &str, dp: Datapoint) {
        let key = (etype.to_string(), attr_id.to_string(), dp.eid.clone());
        self.datapoints.lock().unwrap().entry(key).or_default().push(dp);
    }

    /// Seed an entity's current-value record. Used to set up test fixtures.
    pub fn seed_record(&self, etype: &str, eid: &str, record: EntityRecord) {
        self.records.lock().unwrap().insert((etype.to_string(), eid.to_string()), record);
    }

    /// Mark a single-value attribute slot on an entity as expiring at `exp`.
    /// The single-value `:exp` bookkeeping this mirrors is opaque to the
    /// manager and delegated entirely to the database.
    pub fn seed_single_expiration(&self, etype: &str, eid: &str, attr_id: &str, exp: DateTime<Utc>) {
        self.single_expiration
            .lock()
            .unwrap()
            .insert((etype.to_string(), eid.to_string(), attr_id.to_string()), exp);
    }

    pub fn datapoint_count(&self, etype: &str, attr_id: &str, eid: &str) -> usize {
        let key = (etype.to_string(), attr_id.to_string(), eid.to_string());
        self.datapoints.lock().unwrap().get(&key).map(Vec::len).unwrap_or(0)
    }

    pub fn datapoints_for(&self, etype: &str, attr_id: &str, eid: &str) -> Vec<Datapoint> {
        let key = (etype.to_string(), attr_id.to_string(), eid.to_string());
        self.datapoints.lock().unwrap().get(&key).cloned().unwrap_or_default()
    }
}

fn overlaps(d: &Datapoint, t1: Option<DateTime<Utc>>, t2: Option<DateTime<Utc>>, closed: bool) -> bool {
    let lower_ok = match t1 {
        Some(t1) => {
            if closed {
                d.t2 >= t1
            } else {
                d.t2 > t1
            }
        }
        None => true,
    };
    let upper_ok = match t2 {
        Some(t2) => {
            if closed {
                d.t1 <= t2
            } else {
                d.t1 < t2
            }
        }
        None => true,
    };
    lower_ok && upper_ok
}

#[async_trait]
impl EntityDatabase for InMemoryDatabase {
    async fn get_datapoints_range(&self, q: RangeQuery) -> Result<Vec<Datapoint>, String> {
        let key = (q.etype.clone(), q.attr_id.clone(), q.eid.clone());
        let store = self.datapoints.lock().unwrap();
        let mut results: Vec<Datapoint> = store
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|d| overlaps(d, q.t1, q.t2, q.closed_interval))
            .filter(|d| match q.filter_redundant {
                RedundantFilter::Exclude => d.tag != Tag::Redundant,
                RedundantFilter::Only => d.tag == Tag::Redundant,
                RedundantFilter::All => true,
            })
            .cloned()
            .collect();

        match q.sort {
            SortOrder::AscByT1 => results.sort_by_key(|d| d.t1),
            SortOrder::DescByT2 => results.sort_by_key(|d| std::cmp::Reverse(d.t2)),
        }
        if let Some(limit) = q.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn create_datapoint(&self, etype: &str, attr_id: &str, dp: Datapoint) -> Result<(), String> {
        let key = (etype.to_string(), attr_id.to_string(), dp.eid.clone());
        self.datapoints.lock().unwrap().entry(key).or_default().push(dp);
        Ok(())
    }

    async fn rewrite_data_points(&self, etype: &str, attr_id: &str, dps: Vec<Datapoint>) -> Result<(), String> {
        let mut store = self.datapoints.lock().unwrap();
        for dp in dps {
            let key = (etype.to_string(), attr_id.to_string(), dp.eid.clone());
            if let Some(vec) = store.get_mut(&key) {
                if let Some(existing) = vec.iter_mut().find(|e| e.id == dp.id) {
                    *existing = dp;
                    continue;
                }
            }
            store.entry(key).or_default().push(dp);
        }
        Ok(())
    }

    async fn delete_multiple_records(&self, etype: &str, attr_id: &str, ids: Vec<String>) -> Result<(), String> {
        let mut store = self.datapoints.lock().unwrap();
        for vec in store.iter_mut().filter(|(k, _)| k.0 == etype && k.1 == attr_id).map(|(_, v)| v) {
            vec.retain(|d| !ids.contains(&d.id));
        }
        Ok(())
    }

    async fn delete_record(&self, etype: &str, attr_id: &str, id: &str) -> Result<(), String> {
        let mut store = self.datapoints.lock().unwrap();
        for vec in store.iter_mut().filter(|(k, _)| k.0 == etype && k.1 == attr_id).map(|(_, v)| v) {
            vec.retain(|d| d.id != id);
        }
        Ok(())
    }

    async fn delete_old_datapoints(
        &self,
        etype: &str,
        attr_id: &str,
        t_old: Option<DateTime<Utc>>,
        t_redundant: Option<DateTime<Utc>>,
        tag: Option<Tag>,
    ) -> Result<(), String> {
        let mut store = self.datapoints.lock().unwrap();
        for vec in store.iter_mut().filter(|(k, _)| k.0 == etype && k.1 == attr_id).map(|(_, v)| v) {
            if let Some(t_red) = t_redundant {
                vec.retain(|d| !(tag.map_or(true, |t| d.tag == t) && d.t2 < t_red));
            }
            if let Some(t_old) = t_old {
                vec.retain(|d| d.t2 >= t_old);
            }
        }
        Ok(())
    }

    async fn get_entities(&self, etype: &str) -> Result<Vec<String>, String> {
        let records = self.records.lock().unwrap();
        Ok(records.keys().filter(|(et, _)| et == etype).map(|(_, eid)| eid.clone()).collect())
    }

    async fn get_entities_with_expired_values(&self, etype: &str, attr_id: &str) -> Result<Vec<String>, String> {
        let now = Utc::now();
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|((et, _), _)| et == etype)
            .filter(|(_, rec)| rec.multi_expiration.get(attr_id).is_some_and(|exp| exp.iter().any(|e| *e < now)))
            .map(|((_, eid), _)| eid.clone())
            .collect())
    }

    async fn unset_expired_values(&self, etype: &str, attr_id: &str, has_confidence: bool) -> Result<Vec<String>, String> {
        let now = Utc::now();
        let mut touched = Vec::new();
        let expirations = self.single_expiration.lock().unwrap();
        let mut records = self.records.lock().unwrap();
        for ((et, eid, a), exp) in expirations.iter() {
            if et != etype || a != attr_id || *exp >= now {
                continue;
            }
            if let Some(rec) = records.get_mut(&(etype.to_string(), eid.clone())) {
                rec.single_values.remove(attr_id);
                if has_confidence {
                    rec.single_confidence.remove(attr_id);
                }
                touched.push(eid.clone());
            }
        }
        Ok(touched)
    }

    async fn get_record(&self, etype: &str, eid: &str) -> Result<EntityRecord, String> {
        Ok(self.records.lock().unwrap().get(&(etype.to_string(), eid.to_string())).cloned().unwrap_or_default())
    }

    async fn push_record(&self, etype: &str, eid: &str, record: EntityRecord) -> Result<(), String> {
        self.records.lock().unwrap().insert((etype.to_string(), eid.to_string()), record);
        Ok(())
    }
}

/// In-memory task queue; retains every `put_task` call for test assertions.
#[derive(Default)]
pub struct InMemoryTaskQueue {
    tasks: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<(String, String, Vec<String>)> {
        std::mem::take(&mut self.tasks.lock().unwrap())
    }
}

#[async_trait]
impl TaskQueueWriter for InMemoryTaskQueue {
    async fn put_task(&self, etype: &str, eid: &str, events: Vec<String>) {
        self.tasks.lock().unwrap().push((etype.to_string(), eid.to_string(), events));
    }
}

// Value is re-exported so downstream test crates don't need a separate
// dp3-history-core import just to build fixture records.
pub use dp3_history_core::Value as FixtureValue;
