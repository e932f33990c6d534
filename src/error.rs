//! Error taxonomy for the collection and interaction engine
//!
//! Each failure family gets its own enum so collaborators can stay narrow:
//! page access, persistence, engage steps, and per-record parsing all fail
//! independently and are recovered at different layers.

use thiserror::Error;

/// Failures reported by the render-tree / growth-trigger collaborators.
#[derive(Debug, Error)]
pub enum PageError {
    /// The page surface could not produce a render-tree snapshot.
    #[error("render snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    /// The growth action (e.g. scroll-to-bottom) could not be delivered.
    #[error("growth trigger failed: {0}")]
    GrowthFailed(String),
}

/// Failures reported by the key-value persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or lost the operation.
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// A persisted value exists but does not deserialize to its schema.
    #[error("corrupt persisted value under key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Truly exceptional engage-step failures.
///
/// Expected negative outcomes (declined, dialog dismissed, nothing sent) are
/// not errors; they come back as an [`crate::interaction::EngageOutcome`]
/// with `committed: false`.
#[derive(Debug, Error)]
pub enum EngageError {
    #[error("engage step failed: {0}")]
    Failed(String),
}

/// Per-record extraction failure. Recovered locally: the record is skipped
/// and the batch continues.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("no canonical link found in element group")]
    MissingIdentifier,

    #[error("unparseable numeric token '{0}'")]
    BadNumber(String),
}

/// Top-level engine error surfaced through the session control API.
#[derive(Debug, Error)]
pub enum EngineError {
    /// At most one session of each kind may be active; a second start is
    /// rejected, never queued.
    #[error("a {0} session is already active")]
    SessionActive(&'static str),

    #[error("invalid filter criteria: {0}")]
    InvalidCriteria(String),

    /// None of the configured probe selectors compiled.
    #[error("no usable extraction probes: {0}")]
    NoProbes(String),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
