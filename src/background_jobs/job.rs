use super::context::JobContext;
use crate::download_jobs::DownloadError;
use std::time::Duration;
use thiserror::Error;

/// When a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSchedule {
    /// Every `Duration`, starting as soon as the scheduler runs.
    Interval(Duration),
}

impl JobSchedule {
    pub fn interval(&self) -> Duration {
        match self {
            JobSchedule::Interval(interval) => *interval,
        }
    }
}

/// What shutdown does to a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownBehavior {
    /// The job's token is cancelled.
    #[default]
    Cancellable,
    /// The job is left alone and awaited.
    WaitForCompletion,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Job was cancelled")]
    Cancelled,
}

impl From<DownloadError> for JobError {
    fn from(e: DownloadError) -> Self {
        JobError::ExecutionFailed(e.to_string())
    }
}

/// Periodic maintenance work.
///
/// `execute` runs on a blocking thread (`spawn_blocking`); async work goes through
/// [`JobContext::runtime`].
pub trait BackgroundJob: Send + Sync {
    /// Stable key, used in logs and to detect overlapping runs.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schedule(&self) -> JobSchedule;

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
