//! In-process fakes shared by the unit tests.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::artifact_store::ArtifactStore;
use super::coordinator::JobCoordinator;
use super::job_store::SqliteJobStore;
use super::models::ArtifactType;
use super::settings::DownloadJobSettings;
use crate::notifications::{LogMailTransport, NotificationSettings, Notifier};
use crate::task_manager::{
    BackendError, GenerationBackend, GenerationRequest, RemoteStatus, SubmitResponse,
};

/// Scriptable [`GenerationBackend`] recording every submission.
pub struct FakeBackend {
    submit: Mutex<Result<SubmitResponse, BackendError>>,
    status: Mutex<Result<RemoteStatus, BackendError>>,
    size: Mutex<Result<i64, BackendError>>,
    queue_position: Mutex<Result<i64, BackendError>>,
    submissions: Mutex<Vec<GenerationRequest>>,
    submit_delay: Duration,
}

impl FakeBackend {
    /// Accepts every submission and reports the job as waiting.
    pub fn accepting() -> Self {
        Self {
            submit: Mutex::new(Ok(SubmitResponse {
                status: "OK".to_string(),
                error_message: None,
            })),
            status: Mutex::new(Ok(RemoteStatus {
                status: "WAITING".to_string(),
                error_message: None,
            })),
            size: Mutex::new(Ok(0)),
            queue_position: Mutex::new(Ok(1)),
            submissions: Mutex::new(Vec::new()),
            submit_delay: Duration::ZERO,
        }
    }

    pub fn with_submit(result: Result<SubmitResponse, BackendError>) -> Self {
        let backend = Self::accepting();
        *backend.submit.lock().unwrap() = result;
        backend
    }

    pub fn with_status(self, result: Result<RemoteStatus, BackendError>) -> Self {
        self.set_status(result);
        self
    }

    pub fn with_size(self, result: Result<i64, BackendError>) -> Self {
        *self.size.lock().unwrap() = result;
        self
    }

    pub fn with_queue_position(self, result: Result<i64, BackendError>) -> Self {
        *self.queue_position.lock().unwrap() = result;
        self
    }

    /// Answer submissions only after `delay`, like a busy task manager.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn set_status(&self, result: Result<RemoteStatus, BackendError>) {
        *self.status.lock().unwrap() = result;
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn last_submission(&self) -> Option<GenerationRequest> {
        self.submissions.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResponse, BackendError> {
        self.submissions.lock().unwrap().push(request.clone());
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.submit.lock().unwrap().clone()
    }

    async fn poll_status(
        &self,
        _artifact_type: ArtifactType,
        _identifier: &str,
    ) -> Result<RemoteStatus, BackendError> {
        self.status.lock().unwrap().clone()
    }

    async fn poll_size(
        &self,
        _artifact_type: ArtifactType,
        _identifier: &str,
    ) -> Result<i64, BackendError> {
        self.size.lock().unwrap().clone()
    }

    async fn poll_queue_position(
        &self,
        _artifact_type: ArtifactType,
        _identifier: &str,
    ) -> Result<i64, BackendError> {
        self.queue_position.lock().unwrap().clone()
    }
}

/// Coordinator over an in-memory store, with artifacts under `root`.
pub fn coordinator(
    root: &Path,
    backend: Arc<FakeBackend>,
) -> (Arc<SqliteJobStore>, JobCoordinator) {
    let repository = Arc::new(SqliteJobStore::in_memory().unwrap());
    let coordinator = JobCoordinator::new(
        repository.clone(),
        backend,
        ArtifactStore::new(root.join("downloads"), root.join("sources")),
        Arc::new(Notifier::new(
            Arc::new(LogMailTransport),
            NotificationSettings::default(),
        )),
        DownloadJobSettings::default(),
    );
    (repository, coordinator)
}
