use thiserror::Error;

/// Error kinds surfaced by the history manager core.
///
/// These map directly onto the error kinds named in the platform's history
/// management design: spec construction failures are fatal at startup,
/// ingest failures are surfaced to the task processor, and storage/handler
/// failures are logged by the caller and do not stop housekeeping.
#[derive(Debug, Error)]
pub enum Dp3Error {
    /// An `AttrSpec` field is missing, wrongly typed, or out of the
    /// enumerated range. Carries the offending field name.
    #[error("invalid attribute spec: {0}")]
    InvalidSpec(String),

    /// A duration string did not match the `<int><unit>` / `"0"` / `"inf"`
    /// grammar.
    #[error("malformed duration: {0:?}")]
    MalformedDuration(String),

    /// A timestamp string was not valid RFC3339.
    #[error("malformed timestamp: {0:?}")]
    MalformedTimestamp(String),

    /// Incoming interval overlaps non-mergeable PLAIN datapoint(s) on a
    /// single-value attribute.
    #[error("incoming data point overlaps non-mergeable data point(s)")]
    OverlapConflict,

    /// Assertion-grade failure while splitting an AGGREGATED datapoint.
    #[error("split_datapoint: {0}")]
    SplitUnderflow(String),

    /// A collaborator (database, task queue) call failed.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Confidence/expiration update of a single entity failed; the caller
    /// resets that entity's multi-value vectors and continues.
    #[error("handler error for {etype}/{eid}/{attr}: {source}")]
    HandlerError {
        etype: String,
        eid: String,
        attr: String,
        source: String,
    },
}

pub type Result<T> = std::result::Result<T, Dp3Error>;
