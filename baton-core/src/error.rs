//! Error types for baton-core.

use std::path::PathBuf;

use thiserror::Error;

/// Recoverable queue-rule violations. Reported back to the member who
/// triggered them; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The label does not name a recruitment status.
    #[error("{label} is not a valid status. Valid statuses are: {valid}.")]
    InvalidStatus { label: String, valid: String },

    /// The member has no entry in the queue.
    #[error("{member} is not in the queue")]
    NotFound { member: String },

    /// Someone else already holds the active slot.
    #[error("{incumbent} is already actively recruiting. Ask them to leave first.")]
    ActiveConflict { incumbent: String },
}

/// All errors that can arise from loading, saving or mutating the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (permission denied, read-only filesystem, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed persistence file on load, with the file path and a reason.
    #[error("failed to parse registry at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A queue rule rejected the mutation; nothing was written.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl RegistryError {
    /// The queue-rule violation, if that is what this error is.
    pub fn as_queue_error(&self) -> Option<&QueueError> {
        match self {
            RegistryError::Queue(err) => Some(err),
            _ => None,
        }
    }
}
