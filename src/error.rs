//! Error types for inquest-core.

use thiserror::Error;

/// Result type alias using inquest-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving an investigation.
#[derive(Error, Debug)]
pub enum Error {
    /// Transient HTTP failure talking to the worker service
    #[error("Worker service error: {0}")]
    Http(String),

    /// The worker service rejected a spawn request outright
    #[error("Spawn rejected: {0}")]
    SpawnRejected(String),

    /// A worker reached a terminal failure state
    #[error("Worker {worker_id} failed: {status}")]
    WorkerFailed { worker_id: String, status: String },

    /// Timeout during operation
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// An expected artifact never materialized on disk
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No pathway definition for the requested id
    #[error("Pathway not found: {0}")]
    PathwayNotFound(String),

    /// A phase contract was violated (e.g. empty plan)
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a transient worker-service error.
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http(message.into())
    }

    /// Create a non-transient spawn rejection.
    pub fn spawn_rejected(message: impl Into<String>) -> Self {
        Self::SpawnRejected(message.into())
    }

    /// Create a worker-failure error.
    pub fn worker_failed(worker_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::WorkerFailed {
            worker_id: worker_id.into(),
            status: status.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a missing-artifact error.
    pub fn missing_artifact(path: impl Into<String>) -> Self {
        Self::MissingArtifact(path.into())
    }

    /// Create a contract-violation error.
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }

    /// Whether retrying the operation could plausibly succeed.
    ///
    /// Spawn rejections, contract violations, and configuration problems are
    /// permanent; network and service hiccups are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}
