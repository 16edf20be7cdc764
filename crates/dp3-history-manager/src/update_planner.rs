//! Update Planner: plants next-regular-update fields on newly created
//! entities, consumed by an external Updater that issues periodic
//! regular-update events.

use chrono::{DateTime, Duration, Utc};

/// `_nru1d`/`_nru1w` — the next-regular-update instants for an entity
/// created at `ts_added`.
pub fn plan_next_regular_update(ts_added: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (ts_added + Duration::days(1), ts_added + Duration::days(7))
}
