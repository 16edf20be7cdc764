//! Interval-valued observation record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The three mutually exclusive states a stored datapoint can carry,
/// modeled as a tagged enum rather than a bitmask so invalid combinations
/// are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Plain,
    Aggregated,
    Redundant,
}

/// A single observation: `{id, eid, v, c, src, t1, t2, tag}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datapoint {
    pub id: String,
    pub eid: String,
    pub v: Value,
    /// Confidence, `c ∈ [0,1]`.
    pub c: f64,
    /// CSV of source tokens.
    pub src: String,
    pub t1: DateTime<Utc>,
    pub t2: DateTime<Utc>,
    pub tag: Tag,
}

impl Datapoint {
    /// A freshly ingested, not-yet-persisted datapoint always starts PLAIN.
    pub fn new_plain(id: impl Into<String>, eid: impl Into<String>, v: Value, c: f64, src: impl Into<String>, t1: DateTime<Utc>, t2: DateTime<Utc>) -> Self {
        Self { id: id.into(), eid: eid.into(), v, c, src: src.into(), t1, t2, tag: Tag::Plain }
    }

    /// Whether `[t1,t2]` overlaps `other`'s interval, treating both as
    /// closed intervals.
    pub fn overlaps_closed(&self, t1: DateTime<Utc>, t2: DateTime<Utc>) -> bool {
        self.t1 <= t2 && t1 <= self.t2
    }
}
