//! End-to-end ingest and housekeeping scenarios, run against the
//! in-memory reference collaborator.

use chrono::{DateTime, Utc};
use dp3_history_core::attrspec::{AttrSpec, RawAttrSpec, RawHistoryParams};
use dp3_history_core::duration::parse_rfc3339;
use dp3_history_core::{Datapoint, Dp3Error, Tag, Value};
use dp3_history_manager::{housekeeping, ingest, AttrSpecMap};
use dp3_history_memdb::InMemoryDatabase;

const ETYPE: &str = "station";
const ATTR: &str = "reading";
const EID: &str = "s1";

fn t(s: &str) -> DateTime<Utc> {
    parse_rfc3339(s).unwrap()
}

fn src_tokens(src: &str) -> std::collections::BTreeSet<&str> {
    src.split(',').collect()
}

fn observations_spec(multi_value: bool, aggregation_interval: Option<&str>) -> AttrSpec {
    let mut hp = RawHistoryParams::default();
    hp.aggregation_interval = aggregation_interval.map(str::to_string);
    let raw = RawAttrSpec {
        type_: Some("observations".to_string()),
        data_type: Some("int".to_string()),
        multi_value,
        history_params: Some(hp),
        ..Default::default()
    };
    AttrSpec::new(ATTR, raw).unwrap()
}

fn plain(id: &str, v: i64, c: f64, src: &str, t1: &str, t2: &str) -> Datapoint {
    Datapoint::new_plain(id, EID, Value::Int(v), c, src, t(t1), t(t2))
}

async fn ingest(db: &InMemoryDatabase, spec: &AttrSpec, data: Datapoint) -> Result<(), Dp3Error> {
    ingest::process_datapoint(db, spec, ETYPE, ATTR, data).await
}

#[tokio::test]
async fn single_ingest_with_no_neighbors_stays_plain() {
    let db = InMemoryDatabase::new();
    let spec = observations_spec(false, None);

    let data = plain("a", 1, 0.9, "A", "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z");
    ingest(&db, &spec, data).await.unwrap();

    let points = db.datapoints_for(ETYPE, ATTR, EID);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].tag, Tag::Plain);
    assert_eq!(points[0].v, Value::Int(1));
    assert_eq!(points[0].c, 0.9);
}

#[tokio::test]
async fn mergeable_overlap_produces_one_aggregate_and_two_redundants() {
    let db = InMemoryDatabase::new();
    let spec = observations_spec(false, None);

    db.seed_datapoint(ETYPE, ATTR, plain("orig", 1, 0.8, "A", "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z"));

    let incoming = plain("b", 1, 1.0, "B", "2024-01-01T00:00:30Z", "2024-01-01T00:01:30Z");
    ingest(&db, &spec, incoming).await.unwrap();

    let points = db.datapoints_for(ETYPE, ATTR, EID);
    assert_eq!(points.len(), 3, "one AGGREGATED + two REDUNDANT originals");

    let aggregated: Vec<_> = points.iter().filter(|d| d.tag == Tag::Aggregated).collect();
    assert_eq!(aggregated.len(), 1);
    let agg = aggregated[0];
    assert_eq!(agg.v, Value::Int(1));
    assert!((agg.c - 0.9).abs() < 1e-9);
    assert_eq!(src_tokens(&agg.src), ["A", "B"].into_iter().collect::<std::collections::BTreeSet<_>>());
    assert_eq!(agg.t1, t("2024-01-01T00:00:00Z"));
    assert_eq!(agg.t2, t("2024-01-01T00:01:30Z"));

    let redundant_count = points.iter().filter(|d| d.tag == Tag::Redundant).count();
    assert_eq!(redundant_count, 2);
}

#[tokio::test]
async fn non_mergeable_overlap_single_value_conflicts() {
    let db = InMemoryDatabase::new();
    let spec = observations_spec(false, None);

    db.seed_datapoint(ETYPE, ATTR, plain("orig", 1, 0.8, "A", "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z"));

    let incoming = plain("b", 2, 1.0, "B", "2024-01-01T00:00:30Z", "2024-01-01T00:01:30Z");
    let err = ingest(&db, &spec, incoming).await.unwrap_err();
    assert!(matches!(err, Dp3Error::OverlapConflict));
}

#[tokio::test]
async fn non_mergeable_overlap_multi_value_keeps_both() {
    let db = InMemoryDatabase::new();
    let spec = observations_spec(true, None);

    db.seed_datapoint(ETYPE, ATTR, plain("orig", 1, 0.8, "A", "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z"));

    let incoming = plain("b", 2, 1.0, "B", "2024-01-01T00:00:30Z", "2024-01-01T00:01:30Z");
    ingest(&db, &spec, incoming).await.unwrap();

    let points = db.datapoints_for(ETYPE, ATTR, EID);
    assert_eq!(points.len(), 2);
    assert!(points.iter().all(|d| d.tag == Tag::Plain));
    let values: Vec<_> = points.iter().map(|d| d.v.clone()).collect();
    assert!(values.contains(&Value::Int(1)));
    assert!(values.contains(&Value::Int(2)));
}

#[tokio::test]
async fn mergeable_overlap_fully_contained_still_produces_aggregate() {
    let db = InMemoryDatabase::new();
    let spec = observations_spec(false, None);

    // The neighbor's interval is fully inside the incoming one, so the
    // merged envelope equals the incoming interval exactly.
    db.seed_datapoint(ETYPE, ATTR, plain("orig", 1, 0.8, "A", "2024-01-01T00:00:15Z", "2024-01-01T00:00:45Z"));

    let incoming = plain("b", 1, 1.0, "B", "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z");
    ingest(&db, &spec, incoming).await.unwrap();

    let points = db.datapoints_for(ETYPE, ATTR, EID);
    let aggregated: Vec<_> = points.iter().filter(|d| d.tag == Tag::Aggregated).collect();
    assert_eq!(aggregated.len(), 1, "contained neighbor still needs a subsuming AGGREGATED datapoint");
    let agg = aggregated[0];
    assert_eq!(agg.t1, t("2024-01-01T00:00:00Z"));
    assert_eq!(agg.t2, t("2024-01-01T00:01:00Z"));
    assert_eq!(src_tokens(&agg.src), ["A", "B"].into_iter().collect::<std::collections::BTreeSet<_>>());

    let redundant: Vec<_> = points.iter().filter(|d| d.tag == Tag::Redundant).collect();
    assert_eq!(redundant.len(), 1);
    assert_eq!(redundant[0].id, "orig");
}

#[tokio::test]
async fn adjacency_merge_bridges_a_gap() {
    let db = InMemoryDatabase::new();
    let spec = observations_spec(false, Some("2m"));

    db.seed_datapoint(ETYPE, ATTR, plain("early", 1, 0.8, "A", "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z"));
    db.seed_datapoint(ETYPE, ATTR, plain("late", 1, 0.8, "C", "2024-01-01T00:02:00Z", "2024-01-01T00:03:00Z"));

    let incoming = plain("mid", 1, 0.8, "B", "2024-01-01T00:01:00Z", "2024-01-01T00:02:00Z");
    ingest(&db, &spec, incoming).await.unwrap();

    let points = db.datapoints_for(ETYPE, ATTR, EID);
    let aggregated: Vec<_> = points.iter().filter(|d| d.tag == Tag::Aggregated).collect();
    assert_eq!(aggregated.len(), 1);
    assert_eq!(aggregated[0].t1, t("2024-01-01T00:00:00Z"));
    assert_eq!(aggregated[0].t2, t("2024-01-01T00:03:00Z"));

    let redundant_count = points.iter().filter(|d| d.tag == Tag::Redundant).count();
    assert_eq!(redundant_count, 3);
}

#[tokio::test]
async fn housekeeping_prune_respects_max_age_and_aggregation_max_age() {
    let db = InMemoryDatabase::new();
    let mut hp = RawHistoryParams::default();
    hp.max_age = Some("1h".to_string());
    hp.aggregation_max_age = "15m".to_string();
    let raw = RawAttrSpec {
        type_: Some("observations".to_string()),
        data_type: Some("int".to_string()),
        history_params: Some(hp),
        ..Default::default()
    };
    let spec = AttrSpec::new(ATTR, raw).unwrap();

    let mut attr_spec = AttrSpecMap::new();
    attr_spec.insert(ETYPE.to_string(), [(ATTR.to_string(), spec)].into_iter().collect());

    // `delete_old_datapoints` reads the wall clock internally, so fixtures
    // are expressed relative to `Utc::now()` rather than fixed timestamps.
    let now = Utc::now();
    let mut agg = Datapoint::new_plain(
        "agg",
        EID,
        Value::Int(1),
        0.8,
        "A,B",
        now - chrono::Duration::minutes(30),
        now - chrono::Duration::minutes(15),
    );
    agg.tag = Tag::Aggregated;
    db.seed_datapoint(ETYPE, ATTR, agg);

    let mut red = Datapoint::new_plain(
        "red",
        EID,
        Value::Int(1),
        0.8,
        "A",
        now - chrono::Duration::minutes(30),
        now - chrono::Duration::minutes(23),
    );
    red.tag = Tag::Redundant;
    db.seed_datapoint(ETYPE, ATTR, red);

    housekeeping::delete_old_datapoints(&db, &attr_spec).await;

    let remaining = db.datapoints_for(ETYPE, ATTR, EID);
    assert!(remaining.iter().all(|d| d.tag != Tag::Redundant), "REDUNDANT pieces older than aggregation_max_age pruned");
    assert!(remaining.iter().any(|d| d.id == "agg"), "AGGREGATED younger than max_age retained");
}

#[tokio::test]
async fn no_double_subsumption_after_merge() {
    let db = InMemoryDatabase::new();
    let spec = observations_spec(false, None);

    db.seed_datapoint(ETYPE, ATTR, plain("orig", 1, 0.8, "A", "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z"));
    let incoming = plain("b", 1, 1.0, "B", "2024-01-01T00:00:30Z", "2024-01-01T00:01:30Z");
    ingest(&db, &spec, incoming).await.unwrap();

    let points = db.datapoints_for(ETYPE, ATTR, EID);
    let aggregated: Vec<_> = points.iter().filter(|d| d.tag == Tag::Aggregated).collect();
    for redundant in points.iter().filter(|d| d.tag == Tag::Redundant) {
        let containing = aggregated.iter().filter(|a| a.t1 <= redundant.t1 && redundant.t2 <= a.t2).count();
        assert_eq!(containing, 1);
    }
}
