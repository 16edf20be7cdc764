//! Confidence extrapolation.

use chrono::{DateTime, Utc};

use crate::attrspec::HistoryParams;
use crate::datapoint::Datapoint;

/// Effective confidence of `d` at instant `t`, decaying linearly across the
/// attribute's pre/post validity windows. Bounded to `[0, d.c]`; a
/// zero-width validity window with nonzero distance is treated as `0`
/// rather than dividing by zero.
pub fn extrapolate_confidence(d: &Datapoint, t: DateTime<Utc>, params: &HistoryParams) -> f64 {
    let multiplier = if d.t2 < t {
        ratio(t - d.t2, params.post_validity)
    } else if d.t1 > t {
        ratio(d.t1 - t, params.pre_validity)
    } else {
        1.0
    };
    (d.c * multiplier).clamp(0.0, d.c.max(0.0))
}

fn ratio(distance: chrono::Duration, validity: chrono::Duration) -> f64 {
    if validity.is_zero() {
        return if distance.is_zero() { 1.0 } else { 0.0 };
    }
    let distance_secs = distance.num_milliseconds() as f64;
    let validity_secs = validity.num_milliseconds() as f64;
    (1.0 - distance_secs / validity_secs).max(0.0)
}
