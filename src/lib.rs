//! Derivative Server Library
//!
//! The library is meant to be embedded in the host application. Callers build a
//! [`JobCoordinator`] and call [`JobCoordinator::check_download`] for each request.
//! The `derivative-server` binary only runs the maintenance side: the expiration
//! sweep, the status refresh and the metrics endpoint.

pub mod background_jobs;
pub mod config;
pub mod download_jobs;
pub mod metrics;
pub mod notifications;
pub mod sqlite_persistence;
pub mod task_manager;

// Re-export commonly used types for convenience
pub use download_jobs::{
    ArtifactStore, ArtifactType, DownloadError, DownloadJob, DownloadRequest, JobCoordinator,
    JobRepository, JobStatus, SqliteJobStore,
};
pub use task_manager::{GenerationBackend, TaskManagerClient};
