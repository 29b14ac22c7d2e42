//! Create-or-attach entry point and job administration.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::artifact_store::ArtifactStore;
use super::error::DownloadError;
use super::fingerprint;
use super::job_store::JobRepository;
use super::keyed_lock::KeyedLock;
use super::models::{now_millis, ArtifactType, DownloadJob, DownloadRequest, JobStatus};
use super::settings::DownloadJobSettings;
use super::sweeper::ExpirationSweeper;
use crate::metrics;
use crate::notifications::Notifier;
use crate::task_manager::GenerationBackend;

/// Coordinates download jobs between callers, the store, the backend and observers.
///
/// Every operation touching a single job holds that job's identifier lock, so concurrent
/// first requests for the same fingerprint collapse into one job and the WAITING latch is
/// race free within the process. Across processes the store's unique identifier is the
/// backstop: a lost insert race is merged into the winning row.
pub struct JobCoordinator {
    repository: Arc<dyn JobRepository>,
    backend: Arc<dyn GenerationBackend>,
    artifacts: ArtifactStore,
    notifier: Arc<Notifier>,
    sweeper: ExpirationSweeper,
    settings: DownloadJobSettings,
    locks: KeyedLock,
}

impl JobCoordinator {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        backend: Arc<dyn GenerationBackend>,
        artifacts: ArtifactStore,
        notifier: Arc<Notifier>,
        settings: DownloadJobSettings,
    ) -> Self {
        let sweeper = ExpirationSweeper::new(repository.clone(), artifacts.clone());
        Self {
            repository,
            backend,
            artifacts,
            notifier,
            sweeper,
            settings,
            locks: KeyedLock::new(),
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn settings(&self) -> &DownloadJobSettings {
        &self.settings
    }

    /// Create the job for `request` or attach to the existing one, then reconcile and persist it.
    ///
    /// Expired jobs other than the requested one are swept before returning, whatever the
    /// outcome. Returns whether the job was persisted.
    ///
    /// Observers attached to a job that is already READY or ERROR are notified by the next
    /// [`refresh_pending`](Self::refresh_pending) pass.
    pub async fn check_download(&self, request: DownloadRequest) -> Result<bool, DownloadError> {
        let result = self.create_or_attach(&request).await;

        // The request's own job is never swept, even if its TTL ran out during submission.
        if let Err(e) = self.sweeper.sweep_excluding(&request.expected_identifier) {
            warn!("Expiration sweep failed: {:#}", e);
        }

        let type_label = ArtifactType::parse(&request.artifact_type)
            .map(|t| t.as_str())
            .unwrap_or("unknown");
        let outcome = match &result {
            Ok(_) => "ok",
            Err(DownloadError::InvalidArgument(_)) | Err(DownloadError::UnknownArtifactType(_)) => {
                "invalid"
            }
            Err(_) => "error",
        };
        metrics::record_request(type_label, outcome);

        result
    }

    async fn create_or_attach(&self, request: &DownloadRequest) -> Result<bool, DownloadError> {
        let (artifact_type, ttl_ms) = self.validate(request)?;
        let identifier = request.expected_identifier.as_str();

        let _guard = self.locks.lock(identifier).await;
        let now = now_millis();

        let (mut job, is_new) = match self.repository.find_by_identifier(identifier)? {
            Some(mut job) => {
                debug!("Attaching request to existing job {}", identifier);
                job.touch(now);
                (job, false)
            }
            None => {
                debug!(
                    "Creating {} job {} for {}",
                    artifact_type, identifier, request.source_id
                );
                let job = DownloadJob::new(
                    artifact_type,
                    request.source_id.as_str(),
                    request.sub_id.as_str(),
                    ttl_ms,
                    now,
                );
                (job, true)
            }
        };

        if let Some(observer) = &request.observer_email {
            job.add_observer(observer);
        }

        job.reconcile(
            &self.artifacts,
            self.backend.as_ref(),
            self.settings.generation_priority,
        )
        .await;

        if !is_new {
            return Ok(self.repository.update(&job)?);
        }
        if self.repository.insert(&job)? {
            return Ok(true);
        }

        // Another writer created the row first: merge into it.
        debug!("Job {} was inserted concurrently, merging", identifier);
        let Some(mut existing) = self.repository.find_by_identifier(identifier)? else {
            return Ok(self.repository.insert(&job)?);
        };
        existing.merge_observers(&job.observers);
        existing.touch(now);
        Ok(self.repository.update(&existing)?)
    }

    fn validate(&self, request: &DownloadRequest) -> Result<(ArtifactType, i64), DownloadError> {
        if request.artifact_type.trim().is_empty() {
            return Err(DownloadError::InvalidArgument(
                "artifact type is required".to_string(),
            ));
        }
        let artifact_type = ArtifactType::parse(&request.artifact_type)
            .ok_or_else(|| DownloadError::UnknownArtifactType(request.artifact_type.clone()))?;
        if request.source_id.trim().is_empty() {
            return Err(DownloadError::InvalidArgument(
                "source id is required".to_string(),
            ));
        }
        if request.expected_identifier.trim().is_empty() {
            return Err(DownloadError::InvalidArgument(
                "identifier is required".to_string(),
            ));
        }

        let computed =
            fingerprint::download_identifier(artifact_type, &request.source_id, &request.sub_id);
        if computed != request.expected_identifier {
            return Err(DownloadError::InvalidArgument(format!(
                "identifier {} does not match {} of {}/{:?}",
                request.expected_identifier, artifact_type, request.source_id, request.sub_id
            )));
        }

        let ttl_ms = request.ttl_ms.unwrap_or(self.settings.default_ttl_ms);
        if ttl_ms <= 0 {
            return Err(DownloadError::InvalidArgument(format!(
                "ttl must be positive, got {}",
                ttl_ms
            )));
        }
        Ok((artifact_type, ttl_ms))
    }

    pub fn get_job(&self, identifier: &str) -> Result<DownloadJob, DownloadError> {
        self.repository
            .find_by_identifier(identifier)?
            .ok_or_else(|| DownloadError::NotFound(identifier.to_string()))
    }

    pub fn list_jobs(&self) -> Result<Vec<DownloadJob>, DownloadError> {
        Ok(self.repository.list_all()?)
    }

    /// Size of the job's artifact in bytes, `-1` when unknown.
    pub async fn job_size(&self, identifier: &str) -> Result<i64, DownloadError> {
        let job = self.get_job(identifier)?;
        Ok(job.size(&self.artifacts, self.backend.as_ref()).await)
    }

    pub async fn job_queue_position(&self, identifier: &str) -> Result<i64, DownloadError> {
        let job = self.get_job(identifier)?;
        Ok(job.queue_position(self.backend.as_ref()).await)
    }

    /// Path of the servable artifact, if the job is READY and the file is present.
    pub fn artifact_path(&self, identifier: &str) -> Result<Option<PathBuf>, DownloadError> {
        let job = self.get_job(identifier)?;
        if job.status == JobStatus::Ready && self.artifacts.exists(&job) {
            Ok(Some(self.artifacts.artifact_path(&job)))
        } else {
            Ok(None)
        }
    }

    /// Remove a job and its artifact. Returns the job, tombstoned as DELETED.
    pub async fn delete_job(&self, identifier: &str) -> Result<DownloadJob, DownloadError> {
        let _guard = self.locks.lock(identifier).await;
        let mut job = self.get_job(identifier)?;

        job.status = JobStatus::Deleted;
        if !self.repository.delete(identifier)? {
            return Err(DownloadError::NotFound(identifier.to_string()));
        }
        self.remove_artifact(&job);

        info!("Deleted download job {}", identifier);
        Ok(job)
    }

    /// Remove every job built from `source_id`. Returns how many were removed.
    pub async fn purge_source(&self, source_id: &str) -> Result<usize, DownloadError> {
        let jobs = self.repository.find_by_source(source_id)?;
        let mut removed = 0;

        for job in jobs {
            let _guard = self.locks.lock(&job.identifier).await;
            if self.repository.delete(&job.identifier)? {
                self.remove_artifact(&job);
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Purged {} download jobs of source {}", removed, source_id);
        }
        Ok(removed)
    }

    /// Refresh a job's status out of band and notify its observers once it is READY or ERROR.
    ///
    /// A file on disk makes the job READY without asking the backend.
    pub async fn refresh_job(&self, identifier: &str) -> Result<JobStatus, DownloadError> {
        let _guard = self.locks.lock(identifier).await;
        let mut job = self.get_job(identifier)?;
        let before = job.clone();

        if self.artifacts.exists(&job) {
            job.status = JobStatus::Ready;
            job.message = None;
        } else {
            job.update_status(self.backend.as_ref()).await;
        }

        if job.status != before.status {
            debug!(
                "Job {} moved from {} to {}",
                identifier,
                before.status.as_db_str(),
                job.status.as_db_str()
            );
        }

        if job.status.is_notifiable() {
            match self.notifier.notify(&job, job.status).await {
                Ok(true) => job.observers.clear(),
                Ok(false) => {}
                // Observers are kept so the next refresh retries.
                Err(e) => warn!("Notification of job {} failed: {}", identifier, e),
            }
        }

        if job != before {
            self.repository.update(&job)?;
        }
        Ok(job.status)
    }

    /// Refresh every WAITING job and notify the observers still pending on READY or ERROR
    /// jobs. Returns how many jobs settled or had their observers notified.
    pub async fn refresh_pending(&self) -> Result<usize, DownloadError> {
        let pending: Vec<DownloadJob> = self
            .repository
            .list_all()?
            .into_iter()
            .filter(|job| {
                job.status == JobStatus::Waiting
                    || (job.status.is_notifiable() && !job.observers.is_empty())
            })
            .collect();

        let mut handled = 0;
        for job in pending {
            let result = if job.status == JobStatus::Waiting {
                self.refresh_job(&job.identifier)
                    .await
                    .map(|status| status != JobStatus::Waiting)
            } else {
                self.notify_observers(&job.identifier).await
            };
            match result {
                Ok(true) => handled += 1,
                Ok(false) => {}
                // Swept or deleted meanwhile.
                Err(DownloadError::NotFound(_)) => {}
                Err(e) => warn!("Failed to refresh job {}: {}", job.identifier, e),
            }
        }
        Ok(handled)
    }

    /// Notify the job's observers about its current status and clear them on success.
    pub async fn notify_observers(&self, identifier: &str) -> Result<bool, DownloadError> {
        let _guard = self.locks.lock(identifier).await;
        let mut job = self.get_job(identifier)?;

        let sent = self.notifier.notify(&job, job.status).await?;
        if sent {
            job.observers.clear();
            self.repository.update(&job)?;
        }
        Ok(sent)
    }

    /// Run the expiration sweep now.
    pub fn sweep(&self) -> Result<usize, DownloadError> {
        Ok(self.sweeper.sweep()?)
    }

    fn remove_artifact(&self, job: &DownloadJob) {
        if let Err(e) = self.artifacts.delete(job) {
            warn!("Failed to delete artifact of job {}: {}", job.identifier, e);
        }
    }
}
