use thiserror::Error;

/// Tracker error types
///
/// Every variant is recoverable: the user re-issues a start once the
/// source comes back. Retries are the source collaborator's concern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Position source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Position source error: {0}")]
    Source(String),
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;
