//! Wire types exchanged with the task manager.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::download_jobs::ArtifactType;

/// Error message the task manager returns when the job is already queued.
/// Treated as a successful submission.
pub const ALREADY_QUEUED_MESSAGE: &str = "Job already in DB, not adding it!";

/// Failures talking to the task manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Transport failure, timeout or non-success HTTP status.
    #[error("task manager unreachable: {0}")]
    Unreachable(String),

    /// The response body could not be interpreted.
    #[error("malformed task manager response: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Unreachable(_) => "unreachable",
            BackendError::Malformed(_) => "malformed",
        }
    }
}

/// Submission payload for a single derivative.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(skip)]
    pub artifact_type: ArtifactType,
    pub job_type: String,
    pub pi: String,
    pub log_id: String,
    pub source_path: String,
    pub target_dir: String,
    pub priority: i32,
    pub title: String,
    /// Basename of the file to produce, without extension.
    pub file_name: String,
}

/// Response to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl SubmitResponse {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("OK")
    }

    pub fn is_already_queued(&self) -> bool {
        self.error_message.as_deref() == Some(ALREADY_QUEUED_MESSAGE)
    }
}

/// Status of a job as the task manager sees it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
}
