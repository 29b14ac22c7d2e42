//! HTTP client for the task manager service.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use super::models::{BackendError, GenerationRequest, RemoteStatus, SubmitResponse};
use super::GenerationBackend;
use crate::download_jobs::ArtifactType;
use crate::metrics;

/// Client for the remote task manager that renders derivatives.
///
/// Endpoints, relative to `base_url`, with `{type}` the artifact type's endpoint name:
/// - `POST {type}` submits a generation job
/// - `GET {type}/{identifier}/status` returns `{status, errorMessage?}`
/// - `GET {type}/{identifier}/size` returns the current size estimate in bytes
/// - `GET {type}/{identifier}/queue` returns the queue position
#[derive(Clone)]
pub struct TaskManagerClient {
    client: Client,
    base_url: String,
}

impl TaskManagerClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the task manager (e.g., "http://localhost:8080/taskmanager")
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(base_url: impl Into<String>, timeout_sec: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn job_url(&self, artifact_type: ArtifactType, identifier: &str, resource: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            artifact_type.spec().endpoint,
            identifier,
            resource
        )
    }

    async fn get(&self, operation: &'static str, url: &str) -> Result<String, BackendError> {
        slowdown().await;

        let response = self.client.get(url).send().await.map_err(|e| {
            record(operation, BackendError::Unreachable(e.to_string()))
        })?;
        success_body(operation, response).await
    }

    async fn get_integer(&self, operation: &'static str, url: &str) -> Result<i64, BackendError> {
        let body = self.get(operation, url).await?;
        body.trim().parse::<i64>().map_err(|_| {
            record(
                operation,
                BackendError::Malformed(format!("expected an integer, got {:?}", body)),
            )
        })
    }
}

#[async_trait]
impl GenerationBackend for TaskManagerClient {
    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResponse, BackendError> {
        slowdown().await;

        let url = format!("{}/{}", self.base_url, request.artifact_type.spec().endpoint);
        debug!("Submitting {} generation for {}", request.job_type, request.file_name);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| record("submit", BackendError::Unreachable(e.to_string())))?;

        // Rejections come back as a JSON body with a non-success status, so parse first.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| record("submit", BackendError::Unreachable(e.to_string())))?;

        match serde_json::from_str::<SubmitResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(record(
                "submit",
                BackendError::Unreachable(format!("HTTP {}", status)),
            )),
            Err(e) => Err(record("submit", BackendError::Malformed(e.to_string()))),
        }
    }

    async fn poll_status(
        &self,
        artifact_type: ArtifactType,
        identifier: &str,
    ) -> Result<RemoteStatus, BackendError> {
        let body = self
            .get("status", &self.job_url(artifact_type, identifier, "status"))
            .await?;
        serde_json::from_str(&body)
            .map_err(|e| record("status", BackendError::Malformed(e.to_string())))
    }

    async fn poll_size(
        &self,
        artifact_type: ArtifactType,
        identifier: &str,
    ) -> Result<i64, BackendError> {
        self.get_integer("size", &self.job_url(artifact_type, identifier, "size"))
            .await
    }

    async fn poll_queue_position(
        &self,
        artifact_type: ArtifactType,
        identifier: &str,
    ) -> Result<i64, BackendError> {
        self.get_integer("queue", &self.job_url(artifact_type, identifier, "queue"))
            .await
    }
}

async fn success_body(operation: &'static str, response: Response) -> Result<String, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(record(
            operation,
            BackendError::Unreachable(format!("HTTP {}", status)),
        ));
    }
    response
        .text()
        .await
        .map_err(|e| record(operation, BackendError::Unreachable(e.to_string())))
}

fn record(operation: &'static str, error: BackendError) -> BackendError {
    debug!("Task manager {} failed: {}", operation, error);
    metrics::record_backend_error(operation, error.kind());
    error
}

#[cfg(feature = "slowdown")]
async fn slowdown() {
    tokio::time::sleep(Duration::from_millis(500)).await;
}

#[cfg(not(feature = "slowdown"))]
async fn slowdown() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_removal() {
        let client = TaskManagerClient::new("http://localhost:8080/taskmanager/", 30).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/taskmanager");
    }

    #[test]
    fn test_job_url() {
        let client = TaskManagerClient::new("http://tm", 30).unwrap();
        assert_eq!(
            client.job_url(ArtifactType::Epub, "abc", "queue"),
            "http://tm/viewerepub/abc/queue"
        );
    }

    #[tokio::test]
    async fn test_unreachable_maps_to_unreachable() {
        // Port 9 (discard) is essentially never served locally.
        let client = TaskManagerClient::new("http://127.0.0.1:9", 1).unwrap();

        let err = client
            .poll_size(ArtifactType::Pdf, "abc")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unreachable");
    }
}
