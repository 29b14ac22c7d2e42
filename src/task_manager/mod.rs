//! Task manager integration.
//!
//! The task manager is the remote service doing the actual (slow) PDF/EPUB rendering.
//! This module defines the [`GenerationBackend`] seam and its HTTP implementation.

mod client;
mod models;

use async_trait::async_trait;

use crate::download_jobs::ArtifactType;

pub use client::TaskManagerClient;
pub use models::{
    BackendError, GenerationRequest, RemoteStatus, SubmitResponse, ALREADY_QUEUED_MESSAGE,
};

/// Remote generation backend.
///
/// All calls are network bound. Implementations report transport problems as
/// [`BackendError::Unreachable`] and unparsable bodies as [`BackendError::Malformed`];
/// they never retry.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Submit a generation job.
    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResponse, BackendError>;

    /// Poll the remote status of a job.
    async fn poll_status(
        &self,
        artifact_type: ArtifactType,
        identifier: &str,
    ) -> Result<RemoteStatus, BackendError>;

    /// Size estimate in bytes of an in-progress artifact.
    async fn poll_size(
        &self,
        artifact_type: ArtifactType,
        identifier: &str,
    ) -> Result<i64, BackendError>;

    /// Position of the job in the task manager's queue.
    async fn poll_queue_position(
        &self,
        artifact_type: ArtifactType,
        identifier: &str,
    ) -> Result<i64, BackendError>;
}
