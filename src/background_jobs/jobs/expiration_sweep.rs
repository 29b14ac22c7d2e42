//! Expiration sweep background job.
//!
//! Requests already sweep inline; this job keeps the store and disk clean while the
//! service receives no traffic.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior},
};
use crate::download_jobs::JobCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct ExpirationSweepJob {
    coordinator: Arc<JobCoordinator>,
    interval: Duration,
}

impl ExpirationSweepJob {
    pub fn new(coordinator: Arc<JobCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }
}

impl BackgroundJob for ExpirationSweepJob {
    fn id(&self) -> &'static str {
        "expiration_sweep"
    }

    fn name(&self) -> &'static str {
        "Expiration Sweep"
    }

    fn description(&self) -> &'static str {
        "Delete expired download jobs and their artifacts"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(self.interval)
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        // Row and file are deleted together; let a started sweep finish.
        ShutdownBehavior::WaitForCompletion
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let removed = self.coordinator.sweep()?;
        debug!("Expiration sweep removed {} jobs", removed);
        Ok(())
    }
}
