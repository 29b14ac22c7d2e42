//! Status refresh background job.
//!
//! Polls the task manager for every WAITING job, marks finished ones READY or ERROR and
//! notifies their observers, including observers that attached to already settled jobs.
//! Also publishes the per-status job gauge.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::download_jobs::{JobCoordinator, JobStatus};
use crate::metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const COUNTED_STATUSES: [JobStatus; 6] = [
    JobStatus::Initialized,
    JobStatus::Waiting,
    JobStatus::Ready,
    JobStatus::Error,
    JobStatus::Undefined,
    JobStatus::Deleted,
];

pub struct StatusRefreshJob {
    coordinator: Arc<JobCoordinator>,
    interval: Duration,
}

impl StatusRefreshJob {
    pub fn new(coordinator: Arc<JobCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    fn publish_job_counts(&self) -> Result<(), JobError> {
        let jobs = self.coordinator.list_jobs()?;
        let counts: Vec<(JobStatus, usize)> = COUNTED_STATUSES
            .iter()
            .map(|status| {
                (
                    *status,
                    jobs.iter().filter(|job| job.status == *status).count(),
                )
            })
            .collect();
        metrics::set_job_counts(&counts);
        Ok(())
    }
}

impl BackgroundJob for StatusRefreshJob {
    fn id(&self) -> &'static str {
        "status_refresh"
    }

    fn name(&self) -> &'static str {
        "Status Refresh"
    }

    fn description(&self) -> &'static str {
        "Refresh waiting download jobs and notify observers of settled ones"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(self.interval)
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let outcome = ctx.runtime.block_on(async {
            tokio::select! {
                result = self.coordinator.refresh_pending() => Some(result),
                _ = ctx.cancellation_token.cancelled() => None,
            }
        });

        match outcome {
            None => return Err(JobError::Cancelled),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(0)) => debug!("No pending download job settled"),
            Some(Ok(settled)) => info!("{} pending download jobs settled or notified", settled),
        }

        self.publish_job_counts()
    }
}
