//! Pure domain core for the DP3 history manager: duration/timestamp
//! parsing, attribute specification, the datapoint model, the merge
//! engine, and confidence extrapolation. No I/O — everything here is a
//! free function or an immutable value type, safe to share read-only
//! across worker threads.

pub mod attrspec;
pub mod confidence;
pub mod datapoint;
pub mod duration;
pub mod error;
pub mod merge;
pub mod value;

pub use attrspec::AttrSpec;
pub use confidence::extrapolate_confidence;
pub use datapoint::{Datapoint, Tag};
pub use error::{Dp3Error, Result};
pub use merge::{merge, mergeable};
pub use value::Value;
