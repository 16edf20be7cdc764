//! History Manager — ingest path.
//!
//! `process_datapoint` reconciles an incoming datapoint with whatever is
//! already stored for `(etype, attr, eid)`: direct-overlap collision
//! detection, merging with overlapping and nearby datapoints, splitting
//! incompatible datapoints at a pivot instant, and a batched write-back in
//! a fixed commit order so a crash between steps leaves the store in a
//! recoverable, tag-describable state.

use chrono::{DateTime, Utc};
use dp3_history_core::attrspec::AttrType;
use dp3_history_core::{merge, mergeable, AttrSpec, Datapoint, Dp3Error, Tag};

use crate::collaborators::{EntityDatabase, RangeQuery, RedundantFilter, SortOrder};

/// Reconcile `data` against whatever history is already stored for
/// `(etype, attr_id, data.eid)`.
pub async fn process_datapoint(
    db: &dyn EntityDatabase,
    attr_spec: &AttrSpec,
    etype: &str,
    attr_id: &str,
    mut data: Datapoint,
) -> Result<(), Dp3Error> {
    data.tag = Tag::Plain;

    // Fast path: timeseries data is persisted verbatim, never aggregated.
    if attr_spec.attr_type == AttrType::Timeseries {
        db.create_datapoint(etype, attr_id, data)
            .await
            .map_err(Dp3Error::StorageError)?;
        return Ok(());
    }

    let history_params = attr_spec
        .history_params
        .as_ref()
        .expect("observations attribute must carry history_params");
    let multi_value = attr_spec.multi_value;

    let original_t1 = data.t1;
    let original_t2 = data.t2;

    // --- Step 1: direct overlap, collision detection ---------------------
    let mut overlap_query = RangeQuery::new(etype, attr_id, &data.eid);
    overlap_query.t1 = Some(data.t1);
    overlap_query.t2 = Some(data.t2);
    overlap_query.closed_interval = false;
    overlap_query.filter_redundant = RedundantFilter::All;
    let overlapping = db.get_datapoints_range(overlap_query).await.map_err(Dp3Error::StorageError)?;

    let mergeable_flags: Vec<bool> = overlapping.iter().map(|d| mergeable(&data, d, history_params)).collect();
    for (d, &is_mergeable) in overlapping.iter().zip(&mergeable_flags) {
        if !is_mergeable && d.tag != Tag::Aggregated && !multi_value {
            return Err(Dp3Error::OverlapConflict);
        }
    }

    // --- Step 2: merge with directly overlapping datapoints --------------
    let mut agg = data.clone();
    let mut redundant: Vec<Datapoint> = Vec::new();
    let mut delete_ids: Vec<String> = Vec::new();

    for (d, &is_mergeable) in overlapping.iter().zip(&mergeable_flags) {
        if d.tag == Tag::Redundant {
            continue;
        }
        if is_mergeable {
            merge(&mut agg, d, history_params);
            if d.tag == Tag::Aggregated {
                delete_ids.push(d.id.clone());
            } else {
                let mut retagged = d.clone();
                retagged.tag = Tag::Redundant;
                redundant.push(retagged);
            }
        } else if multi_value {
            continue;
        } else {
            split_datapoint(db, attr_spec, etype, attr_id, d, original_t1).await?;
        }
    }

    // --- Step 3: merge with adjacent (non-overlapping) datapoints --------
    let aggregation_interval = history_params.aggregation_interval;

    let mut pre_query = RangeQuery::new(etype, attr_id, &data.eid);
    pre_query.t1 = Some(original_t1 - aggregation_interval);
    pre_query.t2 = Some(original_t1);
    pre_query.closed_interval = false;
    pre_query.sort = SortOrder::DescByT2;
    pre_query.filter_redundant = RedundantFilter::Exclude;
    let pre = db.get_datapoints_range(pre_query).await.map_err(Dp3Error::StorageError)?;

    let mut post_query = RangeQuery::new(etype, attr_id, &data.eid);
    post_query.t1 = Some(original_t2);
    post_query.t2 = Some(original_t2 + aggregation_interval);
    post_query.closed_interval = false;
    post_query.sort = SortOrder::AscByT1;
    post_query.filter_redundant = RedundantFilter::Exclude;
    let post = db.get_datapoints_range(post_query).await.map_err(Dp3Error::StorageError)?;

    // A pre/post candidate whose span strictly reaches into `[original_t1,
    // original_t2]` already overlapped the incoming interval and was
    // handled by step 1; skip it here to avoid merging it twice. A
    // candidate that only touches at the boundary (`d.t2 == original_t1` or
    // `d.t1 == original_t2`) was deliberately excluded from step 1's
    // open-ended overlap test and is exactly the adjacency case this step
    // exists to merge.
    for (side, touches_existing) in [(&pre, true), (&post, false)] {
        for d in side.iter() {
            let touches = if touches_existing { d.t2 > original_t1 } else { d.t1 < original_t2 };
            if touches {
                continue;
            }
            if mergeable(&agg, d, history_params) {
                merge(&mut agg, d, history_params);
                if d.tag == Tag::Aggregated {
                    delete_ids.push(d.id.clone());
                } else {
                    let mut retagged = d.clone();
                    retagged.tag = Tag::Redundant;
                    redundant.push(retagged);
                }
            } else if multi_value {
                continue;
            } else {
                break;
            }
        }
    }

    // --- Step 4: commit ----------------------------------------------------
    // A merge may leave the envelope equal to `data`'s own interval (a
    // fully-contained neighbor), so gate on whether a merge actually
    // happened, not on whether the interval grew.
    let merged_anything = !redundant.is_empty() || !delete_ids.is_empty();
    if merged_anything {
        agg.tag = Tag::Aggregated;
        data.tag = Tag::Redundant;
        db.create_datapoint(etype, attr_id, agg).await.map_err(Dp3Error::StorageError)?;
    }
    db.create_datapoint(etype, attr_id, data).await.map_err(Dp3Error::StorageError)?;

    if !redundant.is_empty() {
        db.rewrite_data_points(etype, attr_id, redundant).await.map_err(Dp3Error::StorageError)?;
    }
    if !delete_ids.is_empty() {
        db.delete_multiple_records(etype, attr_id, delete_ids).await.map_err(Dp3Error::StorageError)?;
    }

    Ok(())
}

/// Split an AGGREGATED datapoint `d` at `pivot`.
///
/// Replays `d`'s REDUNDANT constituents, reforming two aggregates split at
/// `pivot`: one for constituents with `t2 <= pivot`, one for the
/// remainder. Each side collapses to PLAIN when it reduces to exactly one
/// constituent.
async fn split_datapoint(
    db: &dyn EntityDatabase,
    attr_spec: &AttrSpec,
    etype: &str,
    attr_id: &str,
    d: &Datapoint,
    pivot: DateTime<Utc>,
) -> Result<(), Dp3Error> {
    let history_params = attr_spec.history_params.as_ref().expect("observations attribute");

    let mut query = RangeQuery::new(etype, attr_id, &d.eid);
    query.t1 = Some(d.t1);
    query.t2 = Some(d.t2);
    query.sort = SortOrder::AscByT1;
    query.filter_redundant = RedundantFilter::Only;
    let constituents = db.get_datapoints_range(query).await.map_err(Dp3Error::StorageError)?;

    if constituents.is_empty() {
        return Err(Dp3Error::SplitUnderflow("unable to split, not enough data".into()));
    }
    if constituents[0].t1 >= pivot {
        return Err(Dp3Error::SplitUnderflow("unable to split, not enough data".into()));
    }

    let mut before = constituents[0].clone();
    before.id = fresh_id();
    before.t1 = d.t1; // in case some old data points got deleted

    let before_first_t2 = constituents[0].t2;
    let mut flag = true;
    let mut after = before.clone();
    let mut after_first_t1 = before_first_t2; // placeholder until the split point is found
    let mut after_single_id = String::new();

    for r in &constituents[1..] {
        if flag && r.t1 > pivot {
            flag = false;
            after = r.clone();
            after.id = fresh_id();
            after_first_t1 = r.t1;
            after_single_id = r.id.clone();
            continue;
        }
        if flag {
            merge(&mut before, r, history_params);
        } else {
            merge(&mut after, r, history_params);
        }
    }

    db.delete_record(etype, attr_id, &d.id).await.map_err(Dp3Error::StorageError)?;

    if before.t2 == before_first_t2 {
        before.tag = Tag::Plain;
        db.delete_record(etype, attr_id, &constituents[0].id).await.map_err(Dp3Error::StorageError)?;
    } else {
        before.tag = Tag::Aggregated;
    }
    db.create_datapoint(etype, attr_id, before).await.map_err(Dp3Error::StorageError)?;

    if !flag {
        if after.t1 == after_first_t1 {
            after.tag = Tag::Plain;
            db.delete_record(etype, attr_id, &after_single_id).await.map_err(Dp3Error::StorageError)?;
        } else {
            after.tag = Tag::Aggregated;
        }
        db.create_datapoint(etype, attr_id, after).await.map_err(Dp3Error::StorageError)?;
    }

    Ok(())
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp3_history_core::attrspec::{AttrSpec, RawAttrSpec, RawHistoryParams};
    use dp3_history_core::duration::parse_rfc3339;
    use dp3_history_memdb::InMemoryDatabase;

    const ETYPE: &str = "station";
    const ATTR: &str = "reading";
    const EID: &str = "s1";

    fn t(s: &str) -> DateTime<Utc> {
        parse_rfc3339(s).unwrap()
    }

    fn spec() -> AttrSpec {
        let raw = RawAttrSpec {
            type_: Some("observations".to_string()),
            data_type: Some("int".to_string()),
            history_params: Some(RawHistoryParams::default()),
            ..Default::default()
        };
        AttrSpec::new(ATTR, raw).unwrap()
    }

    fn plain(id: &str, v: i64, t1: &str, t2: &str) -> Datapoint {
        Datapoint::new_plain(id, EID, dp3_history_core::Value::Int(v), 0.8, "A", t(t1), t(t2))
    }

    /// Splitting an AGGREGATED datapoint at a pivot that falls inside one of
    /// its REDUNDANT constituents (§4.5.1) reforms two replacement
    /// aggregates: one spanning the constituents up to the pivot, one for
    /// the remainder, each collapsing to PLAIN when it is a single
    /// constituent.
    #[tokio::test]
    async fn splits_at_pivot_into_two_sides() {
        let db = InMemoryDatabase::new();
        let attr_spec = spec();

        let mut r1 = plain("r1", 1, "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z");
        r1.tag = Tag::Redundant;
        let mut r2 = plain("r2", 1, "2024-01-01T00:01:00Z", "2024-01-01T00:02:00Z");
        r2.tag = Tag::Redundant;
        let mut r3 = plain("r3", 1, "2024-01-01T00:02:00Z", "2024-01-01T00:03:00Z");
        r3.tag = Tag::Redundant;
        db.seed_datapoint(ETYPE, ATTR, r1);
        db.seed_datapoint(ETYPE, ATTR, r2);
        db.seed_datapoint(ETYPE, ATTR, r3);

        let mut agg = plain("agg", 1, "2024-01-01T00:00:00Z", "2024-01-01T00:03:00Z");
        agg.tag = Tag::Aggregated;
        db.seed_datapoint(ETYPE, ATTR, agg.clone());

        split_datapoint(&db, &attr_spec, ETYPE, ATTR, &agg, t("2024-01-01T00:01:00Z")).await.unwrap();

        let points = db.datapoints_for(ETYPE, ATTR, EID);
        assert!(points.iter().all(|d| d.id != "agg"), "original AGGREGATED row removed");

        let before: Vec<_> = points
            .iter()
            .filter(|d| d.t1 == t("2024-01-01T00:00:00Z") && d.t2 == t("2024-01-01T00:02:00Z"))
            .collect();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].tag, Tag::Aggregated, "before side merged two constituents");

        let after: Vec<_> = points
            .iter()
            .filter(|d| d.t1 == t("2024-01-01T00:02:00Z") && d.t2 == t("2024-01-01T00:03:00Z"))
            .collect();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].tag, Tag::Plain, "after side is a single constituent, retagged PLAIN");
        assert!(points.iter().all(|d| d.id != "r3"), "superseded single constituent row removed");
    }

    #[tokio::test]
    async fn split_underflow_when_pivot_at_or_before_earliest_constituent() {
        let db = InMemoryDatabase::new();
        let attr_spec = spec();

        let mut r1 = plain("r1", 1, "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z");
        r1.tag = Tag::Redundant;
        db.seed_datapoint(ETYPE, ATTR, r1);

        let mut agg = plain("agg", 1, "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z");
        agg.tag = Tag::Aggregated;

        let err = split_datapoint(&db, &attr_spec, ETYPE, ATTR, &agg, t("2024-01-01T00:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, Dp3Error::SplitUnderflow(_)));
    }
}
