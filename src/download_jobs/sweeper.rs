//! Removal of expired jobs and their artifacts.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::artifact_store::ArtifactStore;
use super::job_store::JobRepository;
use super::models::now_millis;
use crate::metrics;

/// Deletes every job whose TTL has elapsed.
///
/// The record goes first; the artifact is only removed once the record is gone, so a
/// failed record deletion never leaves a job pointing at a missing file.
pub struct ExpirationSweeper {
    repository: Arc<dyn JobRepository>,
    artifacts: ArtifactStore,
}

impl ExpirationSweeper {
    pub fn new(repository: Arc<dyn JobRepository>, artifacts: ArtifactStore) -> Self {
        Self {
            repository,
            artifacts,
        }
    }

    /// Sweep now. Returns how many jobs were removed.
    pub fn sweep(&self) -> Result<usize> {
        self.sweep_at(now_millis(), None)
    }

    /// Sweep now, leaving the job `identifier` alone whatever its age.
    ///
    /// Used right after a request persisted that job, which must survive its own request.
    pub fn sweep_excluding(&self, identifier: &str) -> Result<usize> {
        self.sweep_at(now_millis(), Some(identifier))
    }

    /// Sweep as if the current time were `now_ms`.
    ///
    /// Expiry is decided again by the store at deletion time, so a job requested after the
    /// listing survives. Only listing the jobs can fail; per-job failures are logged and
    /// skipped.
    pub fn sweep_at(&self, now_ms: i64, excluded: Option<&str>) -> Result<usize> {
        let jobs = self.repository.list_all()?;
        let mut removed = 0;

        let expired = jobs
            .iter()
            .filter(|job| job.is_expired_at(now_ms))
            .filter(|job| excluded != Some(job.identifier.as_str()));
        for job in expired {
            match self.repository.delete_if_expired(&job.identifier, now_ms) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Expired job {} already gone or requested again", job.identifier);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to delete expired job {}: {:#}", job.identifier, e);
                    continue;
                }
            }
            removed += 1;

            if let Err(e) = self.artifacts.delete(job) {
                warn!(
                    "Failed to delete artifact of expired job {}: {}",
                    job.identifier, e
                );
            }
        }

        if removed > 0 {
            info!("Swept {} expired download jobs", removed);
            metrics::record_jobs_swept(removed);
        }
        Ok(removed)
    }
}
