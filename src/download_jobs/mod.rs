//! Derivative download jobs
//!
//! A job tracks one generated artifact (PDF or EPUB) of a source record, identified by the
//! fingerprint of its defining criteria. Requests create or attach to jobs through the
//! [`JobCoordinator`], generation is delegated to a
//! [`GenerationBackend`](crate::task_manager::GenerationBackend), and expired jobs are removed
//! together with their files by the [`ExpirationSweeper`].

mod artifact_store;
mod coordinator;
mod error;
pub mod fingerprint;
mod job_store;
mod keyed_lock;
mod lifecycle;
mod models;
mod schema;
mod settings;
mod sweeper;

#[cfg(test)]
pub(crate) mod test_support;

pub use artifact_store::ArtifactStore;
pub use coordinator::JobCoordinator;
pub use error::{DownloadError, GenerationError};
pub use job_store::{JobRepository, SqliteJobStore};
pub use lifecycle::{ReconcileOutcome, MALFORMED_STATUS_MESSAGE, UNAVAILABLE};
pub use models::{
    now_millis, ArtifactSpec, ArtifactType, DownloadJob, DownloadRequest, JobStatus,
};
pub use settings::{DownloadJobSettings, DEFAULT_TTL_MS};
pub use sweeper::ExpirationSweeper;
