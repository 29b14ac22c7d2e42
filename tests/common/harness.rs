//! Test harness wiring the real store, client and coordinator together
//!
//! Each harness owns an isolated temp directory holding the job database and the
//! artifact tree, plus its own fake task manager.

use super::constants::*;
use super::mail::RecordingMailTransport;
use super::task_manager::FakeTaskManager;
use derivative_server::download_jobs::fingerprint::download_identifier;
use derivative_server::download_jobs::{
    ArtifactStore, ArtifactType, DownloadError, DownloadJob, DownloadJobSettings,
    DownloadRequest, JobCoordinator, JobRepository, SqliteJobStore,
};
use derivative_server::notifications::{NotificationSettings, Notifier};
use derivative_server::task_manager::TaskManagerClient;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestHarness {
    pub coordinator: Arc<JobCoordinator>,
    pub store: Arc<SqliteJobStore>,
    pub task_manager: FakeTaskManager,
    pub mail: Arc<RecordingMailTransport>,
    pub artifacts: ArtifactStore,
    pub db_path: PathBuf,

    // Keep the temp directory alive until drop
    _temp_dir: TempDir,
}

impl TestHarness {
    /// Spawns a harness talking to a fresh fake task manager.
    pub async fn spawn() -> Self {
        let task_manager = FakeTaskManager::spawn().await;
        let url = task_manager.base_url.clone();
        Self::build(task_manager, &url)
    }

    /// Spawns a harness whose client points at `url` instead of the fake.
    pub async fn with_task_manager_url(url: &str) -> Self {
        let task_manager = FakeTaskManager::spawn().await;
        Self::build(task_manager, url)
    }

    fn build(task_manager: FakeTaskManager, url: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("download_jobs.db");
        let store = Arc::new(SqliteJobStore::new(&db_path).expect("Failed to open job store"));
        let client = Arc::new(
            TaskManagerClient::new(url, CLIENT_TIMEOUT_SEC).expect("Failed to build client"),
        );
        let mail = Arc::new(RecordingMailTransport::default());
        let notifier = Arc::new(Notifier::new(
            mail.clone(),
            NotificationSettings {
                sender: "derivatives@example.org".to_string(),
                download_base_url: Some("https://example.org/downloads".to_string()),
                ..Default::default()
            },
        ));
        let artifacts = ArtifactStore::new(
            temp_dir.path().join("downloads"),
            temp_dir.path().join("sources"),
        );
        let coordinator = Arc::new(JobCoordinator::new(
            store.clone(),
            client,
            artifacts.clone(),
            notifier,
            DownloadJobSettings::default(),
        ));

        Self {
            coordinator,
            store,
            task_manager,
            mail,
            artifacts,
            db_path,
            _temp_dir: temp_dir,
        }
    }

    /// Request a PDF of `source_id`/`sub_id` on behalf of the reference observer.
    pub async fn request_pdf(&self, source_id: &str, sub_id: &str) -> Result<bool, DownloadError> {
        self.request(ArtifactType::Pdf, source_id, sub_id, Some(OBSERVER_A))
            .await
    }

    pub async fn request(
        &self,
        artifact_type: ArtifactType,
        source_id: &str,
        sub_id: &str,
        observer: Option<&str>,
    ) -> Result<bool, DownloadError> {
        self.coordinator
            .check_download(DownloadRequest {
                artifact_type: artifact_type.as_str().to_string(),
                observer_email: observer.map(str::to_string),
                source_id: source_id.to_string(),
                sub_id: sub_id.to_string(),
                expected_identifier: download_identifier(artifact_type, source_id, sub_id),
                ttl_ms: Some(SCENARIO_TTL_MS),
            })
            .await
    }

    /// The persisted job for the given criteria.
    pub fn job(&self, artifact_type: ArtifactType, source_id: &str, sub_id: &str) -> DownloadJob {
        let identifier = download_identifier(artifact_type, source_id, sub_id);
        self.store
            .find_by_identifier(&identifier)
            .expect("Failed to read job store")
            .unwrap_or_else(|| panic!("No job {}", identifier))
    }

    pub fn job_count(&self) -> usize {
        self.store.list_all().expect("Failed to read job store").len()
    }

    /// Simulate the task manager writing the artifact of `job`.
    pub fn write_artifact(&self, job: &DownloadJob, content: &[u8]) -> PathBuf {
        let path = self.artifacts.artifact_path(job);
        std::fs::create_dir_all(path.parent().expect("Artifact path has a parent"))
            .expect("Failed to create artifact dir");
        std::fs::write(&path, content).expect("Failed to write artifact");
        path
    }
}
