//! Job state machine.
//!
//! `reconcile` runs once per inbound request:
//! 1. WAITING stays WAITING, generation is never re-triggered while one is outstanding.
//! 2. An artifact on disk forces READY.
//! 3. Otherwise generation is triggered: WAITING on success, ERROR with message on failure.

use tracing::{debug, info, warn};

use super::artifact_store::ArtifactStore;
use super::error::GenerationError;
use super::models::{DownloadJob, JobStatus};
use crate::metrics;
use crate::task_manager::{BackendError, GenerationBackend, GenerationRequest};

/// Message stored on a job whose remote status could not be parsed.
pub const MALFORMED_STATUS_MESSAGE: &str = "Failed to parse task manager status response";

/// Sentinel for size and queue position when the backend cannot answer.
pub const UNAVAILABLE: i64 = -1;

/// What a reconcile step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A generation is already outstanding.
    StillWaiting,
    /// The artifact exists on disk.
    Ready,
    /// A generation was submitted.
    Triggered,
    /// Submission failed; the job is in ERROR.
    Failed(String),
}

impl DownloadJob {
    pub async fn reconcile(
        &mut self,
        artifacts: &ArtifactStore,
        backend: &dyn GenerationBackend,
        priority: i32,
    ) -> ReconcileOutcome {
        if self.status == JobStatus::Waiting {
            debug!("Job {} is already waiting for generation", self.identifier);
            return ReconcileOutcome::StillWaiting;
        }

        if artifacts.exists(self) {
            self.status = JobStatus::Ready;
            self.message = None;
            return ReconcileOutcome::Ready;
        }

        match self.trigger_creation(artifacts, backend, priority).await {
            Ok(()) => {
                info!(
                    "Triggered {} generation for {} ({})",
                    self.artifact_type.spec().display_name,
                    self.source_id,
                    self.identifier
                );
                metrics::record_generation_trigger(self.artifact_type.as_str(), "ok");
                self.status = JobStatus::Waiting;
                self.message = None;
                ReconcileOutcome::Triggered
            }
            Err(e) => {
                warn!("Generation of {} failed: {}", self.identifier, e);
                metrics::record_generation_trigger(self.artifact_type.as_str(), "error");
                let message = e.to_string();
                self.status = JobStatus::Error;
                self.message = Some(message.clone());
                ReconcileOutcome::Failed(message)
            }
        }
    }

    /// Ask the backend to produce this job's artifact.
    ///
    /// A rejection because the job is already queued counts as success.
    pub async fn trigger_creation(
        &self,
        artifacts: &ArtifactStore,
        backend: &dyn GenerationBackend,
        priority: i32,
    ) -> Result<(), GenerationError> {
        let target_dir = artifacts.output_dir(self.artifact_type);
        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(|source| GenerationError::OutputDirectory {
                path: target_dir.clone(),
                source,
            })?;

        let request = GenerationRequest {
            artifact_type: self.artifact_type,
            job_type: self.artifact_type.spec().task_type.to_string(),
            pi: self.source_id.clone(),
            log_id: self.sub_id.clone(),
            source_path: artifacts
                .source_path(&self.source_id)
                .to_string_lossy()
                .into_owned(),
            target_dir: target_dir.to_string_lossy().into_owned(),
            priority,
            title: self.title(),
            file_name: self.identifier.clone(),
        };

        let response = backend.submit(&request).await?;
        if response.is_ok() {
            return Ok(());
        }
        if response.is_already_queued() {
            debug!("Job {} already queued in task manager", self.identifier);
            return Ok(());
        }
        Err(GenerationError::Rejected(
            response
                .error_message
                .unwrap_or_else(|| format!("task manager status {}", response.status)),
        ))
    }

    /// Size in bytes: the file's when it exists, else the backend's estimate, else `-1`.
    pub async fn size(&self, artifacts: &ArtifactStore, backend: &dyn GenerationBackend) -> i64 {
        if let Some(size) = artifacts.size(self) {
            return size as i64;
        }
        match backend.poll_size(self.artifact_type, &self.identifier).await {
            Ok(size) => size,
            Err(_) => UNAVAILABLE,
        }
    }

    /// `-1` for ERROR, `0` for READY, otherwise the backend's live position (or `-1`).
    pub async fn queue_position(&self, backend: &dyn GenerationBackend) -> i64 {
        match self.status {
            JobStatus::Error => UNAVAILABLE,
            JobStatus::Ready => 0,
            _ => backend
                .poll_queue_position(self.artifact_type, &self.identifier)
                .await
                .unwrap_or(UNAVAILABLE),
        }
    }

    /// Refresh `status` from the backend.
    ///
    /// An unreachable backend leaves the status untouched; a malformed answer forces ERROR.
    pub async fn update_status(&mut self, backend: &dyn GenerationBackend) -> JobStatus {
        match backend
            .poll_status(self.artifact_type, &self.identifier)
            .await
        {
            Ok(remote) => {
                self.status = JobStatus::from_db_str(&remote.status);
                if self.status == JobStatus::Error {
                    self.message = remote.error_message;
                }
            }
            Err(BackendError::Malformed(detail)) => {
                warn!(
                    "Unparsable status for job {}: {}",
                    self.identifier, detail
                );
                self.status = JobStatus::Error;
                self.message = Some(MALFORMED_STATUS_MESSAGE.to_string());
            }
            Err(BackendError::Unreachable(detail)) => {
                debug!(
                    "Could not refresh status of job {}: {}",
                    self.identifier, detail
                );
            }
        }
        self.status
    }

    fn title(&self) -> String {
        if self.sub_id.is_empty() {
            self.source_id.clone()
        } else {
            format!("{}_{}", self.source_id, self.sub_id)
        }
    }
}
