//! History Manager — housekeeping.
//!
//! Two periodic jobs, meant to be scheduled only on worker 0:
//! `delete_old_datapoints` prunes expired/redundant datapoints;
//! `manage_current_entity_values` recomputes confidences and removes
//! expired values from entities, emitting `!CONFIDENCE`/`!EXPIRED`
//! task-queue events.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use dp3_history_core::attrspec::AttrType;
use dp3_history_core::{extrapolate_confidence, AttrSpec, Tag, Value};

use crate::collaborators::{EntityDatabase, RangeQuery, RedundantFilter, TaskQueueWriter};

/// `{etype: {attr_id: AttrSpec}}` — the whole platform's attribute
/// specification tree, constructed once at startup.
pub type AttrSpecMap = BTreeMap<String, BTreeMap<String, AttrSpec>>;

/// Prune expired and redundant datapoints. A `StorageError` on one
/// `(etype, attr)` pair is logged and the loop continues to the next pair.
pub async fn delete_old_datapoints(db: &dyn EntityDatabase, attr_spec: &AttrSpecMap) {
    let now = Utc::now();

    for (etype, attrs) in attr_spec {
        for (attr_id, spec) in attrs {
            let (t_old, t_redundant, tag) = match spec.attr_type {
                AttrType::Observations => {
                    let hp = spec.history_params.as_ref().expect("observations has history_params");
                    (hp.max_age.map(|d| now - d), Some(now - hp.aggregation_max_age), Some(Tag::Redundant))
                }
                AttrType::Timeseries => {
                    let ts = spec.timeseries.as_ref().expect("timeseries spec present");
                    match ts.max_age {
                        Some(max_age) => (Some(now - max_age), None, None),
                        None => continue,
                    }
                }
                AttrType::Plain => continue,
            };

            if let Err(e) = db.delete_old_datapoints(etype, attr_id, t_old, t_redundant, tag).await {
                tracing::error!(etype, attr_id, error = %e, "delete_old_datapoints failed for attribute");
                continue;
            }
        }
    }
}

/// Recompute current-value confidences and drop expired values.
pub async fn manage_current_entity_values(
    db: &dyn EntityDatabase,
    tqw: &dyn TaskQueueWriter,
    attr_spec: &AttrSpecMap,
) {
    let now = Utc::now();

    for (etype, attrs) in attr_spec {
        let entities = match db.get_entities(etype).await {
            Ok(e) => e,
            Err(e) => {
                tracing::error!(etype, error = %e, "get_entities failed");
                continue;
            }
        };

        let mut entity_events: BTreeMap<String, HashSet<&'static str>> = BTreeMap::new();

        // --- confidence recomputation -----------------------------------
        for (attr_id, spec) in attrs {
            if !spec.confidence {
                continue;
            }
            let hp = spec.history_params.as_ref().expect("confidence attributes carry history_params");

            for eid in &entities {
                match update_confidence(db, etype, attr_id, eid, spec, hp, now).await {
                    Ok(true) => {
                        entity_events.entry(eid.clone()).or_default().insert("!CONFIDENCE");
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(etype, eid, attr_id, error = %e, "manage_current_entity_values: confidence update failed");
                    }
                }
            }
        }

        // --- expiration ---------------------------------------------------
        for (attr_id, spec) in attrs {
            if !spec.has_history() {
                continue;
            }
            if spec.multi_value {
                let expired_entities = match db.get_entities_with_expired_values(etype, attr_id).await {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::error!(etype, attr_id, error = %e, "get_entities_with_expired_values failed");
                        continue;
                    }
                };
                for eid in expired_entities {
                    match expire_multi_value(db, etype, attr_id, &eid, spec.confidence, now).await {
                        Ok(()) => {
                            entity_events.entry(eid).or_default().insert("!EXPIRED");
                        }
                        Err(e) => {
                            tracing::error!(etype, eid, attr_id, error = %e, "manage_current_entity_values: expiration recovery triggered");
                        }
                    }
                }
            } else {
                match db.unset_expired_values(etype, attr_id, spec.confidence).await {
                    Ok(touched) => {
                        for eid in touched {
                            entity_events.entry(eid).or_default().insert("!EXPIRED");
                        }
                    }
                    Err(e) => {
                        tracing::error!(etype, attr_id, error = %e, "unset_expired_values failed");
                    }
                }
            }
        }

        for (eid, events) in entity_events {
            let mut events: Vec<String> = events.into_iter().map(str::to_string).collect();
            events.sort();
            tqw.put_task(etype, &eid, events).await;
        }
    }
}

/// Recompute confidence for one `(etype, attr, eid)`. Returns whether a
/// `!CONFIDENCE` event should be emitted (the entity currently holds a
/// value for this attribute).
async fn update_confidence(
    db: &dyn EntityDatabase,
    etype: &str,
    attr_id: &str,
    eid: &str,
    spec: &AttrSpec,
    hp: &dp3_history_core::attrspec::HistoryParams,
    now: chrono::DateTime<Utc>,
) -> Result<bool, String> {
    let mut record = db.get_record(etype, eid).await?;

    if spec.multi_value {
        let Some(current_values) = record.multi_values.get(attr_id).cloned() else {
            return Ok(false);
        };
        if current_values.is_empty() {
            return Ok(false);
        }

        let mut query = RangeQuery::new(etype, attr_id, eid);
        query.t1 = Some(now - hp.pre_validity);
        query.t2 = Some(now + hp.post_validity);
        let datapoints = db.get_datapoints_range(query).await?;

        // Window absent: multi-value confidence defaults to 0.0.
        let mut best = vec![0.0_f64; current_values.len()];
        for d in &datapoints {
            if let Some(idx) = current_values.iter().position(|v| v == &d.v) {
                let c = extrapolate_confidence(d, now, hp);
                if c > best[idx] {
                    best[idx] = c;
                }
            }
        }
        record.multi_confidence.insert(attr_id.to_string(), best);
        db.push_record(etype, eid, record).await?;
        Ok(true)
    } else {
        let Some(current_value) = record.single_values.get(attr_id).cloned() else {
            return Ok(false);
        };
        if matches!(current_value, Value::Null) {
            return Ok(false);
        }

        let mut query = RangeQuery::new(etype, attr_id, eid);
        query.t1 = Some(now - hp.pre_validity);
        query.t2 = Some(now + hp.post_validity);
        let datapoints = db.get_datapoints_range(query).await?;

        // Window absent: single-value confidence is left untouched.
        let mut best: Option<f64> = None;
        for d in &datapoints {
            if d.v != current_value {
                continue;
            }
            let c = extrapolate_confidence(d, now, hp);
            if best.is_none_or(|b| c > b) {
                best = Some(c);
            }
        }
        match best {
            Some(c) => {
                record.single_confidence.insert(attr_id.to_string(), c);
                db.push_record(etype, eid, record).await?;
                Ok(true)
            }
            // No eligible datapoint in the window: confidence is left
            // untouched, so this entity was not actually touched.
            None => Ok(false),
        }
    }
}

/// Multi-value expiration: drop every `(v[i], c[i], exp[i])` whose
/// `exp[i] < now`. A corrupted vector state is recovered by clearing all
/// three vectors.
async fn expire_multi_value(
    db: &dyn EntityDatabase,
    etype: &str,
    attr_id: &str,
    eid: &str,
    has_confidence: bool,
    now: chrono::DateTime<Utc>,
) -> Result<(), String> {
    let mut record = db.get_record(etype, eid).await?;

    let result = (|| {
        let values = record.multi_values.get(attr_id)?.clone();
        let exp = record.multi_expiration.get(attr_id)?.clone();
        let confidence = if has_confidence { record.multi_confidence.get(attr_id).cloned() } else { None };
        if values.len() != exp.len() || (has_confidence && confidence.as_ref().is_some_and(|c| c.len() != values.len())) {
            return None; // corrupted: treated as recovery case below
        }

        let mut new_values = Vec::with_capacity(values.len());
        let mut new_exp = Vec::with_capacity(exp.len());
        let mut new_conf = confidence.as_ref().map(|_| Vec::with_capacity(values.len()));

        for i in 0..values.len() {
            if exp[i] < now {
                continue;
            }
            new_values.push(values[i].clone());
            new_exp.push(exp[i]);
            if let (Some(new_conf), Some(conf)) = (new_conf.as_mut(), confidence.as_ref()) {
                new_conf.push(conf[i]);
            }
        }
        Some((new_values, new_exp, new_conf))
    })();

    match result {
        Some((values, exp, conf)) => {
            record.multi_values.insert(attr_id.to_string(), values);
            record.multi_expiration.insert(attr_id.to_string(), exp);
            if let Some(conf) = conf {
                record.multi_confidence.insert(attr_id.to_string(), conf);
            }
        }
        None => {
            record.multi_values.insert(attr_id.to_string(), Vec::new());
            record.multi_expiration.insert(attr_id.to_string(), Vec::new());
            if has_confidence {
                record.multi_confidence.insert(attr_id.to_string(), Vec::new());
            }
        }
    }

    db.push_record(etype, eid, record).await
}
