use std::path::PathBuf;

use thiserror::Error;

use crate::notifications::NotificationError;
use crate::task_manager::BackendError;

/// Errors surfaced by the coordinator to its callers.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown artifact type: {0}")]
    UnknownArtifactType(String),

    #[error("Download job not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

/// Reasons a generation could not be started.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to create output directory {path:?}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Generation rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
