use super::context::JobContext;
use super::job::{BackgroundJob, JobError, ShutdownBehavior};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Upper bound on how long the scheduler sleeps between checks.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// Manages background job scheduling and execution.
pub struct JobScheduler {
    jobs: HashMap<String, Arc<dyn BackgroundJob>>,

    /// When each job is due next.
    next_runs: HashMap<String, Instant>,

    /// Currently running jobs with their task handles.
    running_handles: HashMap<String, JoinHandle<()>>,

    /// Cancellation tokens for each running job.
    job_cancel_tokens: HashMap<String, CancellationToken>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,
}

impl JobScheduler {
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            jobs: HashMap::new(),
            next_runs: HashMap::new(),
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            shutdown_token,
        }
    }

    /// Register a job with the scheduler. It first runs as soon as the scheduler starts.
    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!(
            "Registering job: {} - {} (every {:?})",
            job_id,
            job.description(),
            job.schedule().interval()
        );
        self.next_runs.insert(job_id.clone(), Instant::now());
        self.jobs.insert(job_id, job);
    }

    /// Get the number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_job_running(&self, job_id: &str) -> bool {
        self.running_handles
            .get(job_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Main scheduler loop.
    pub async fn run(&mut self) {
        info!("Starting job scheduler with {} registered jobs", self.job_count());

        loop {
            self.cleanup_completed_jobs().await;

            let sleep_duration = self.time_until_next_scheduled_job();
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs();
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    /// Calculate time until the next scheduled job should run.
    fn time_until_next_scheduled_job(&self) -> Duration {
        let now = Instant::now();
        self.next_runs
            .values()
            .map(|next_run| next_run.saturating_duration_since(now))
            .min()
            .unwrap_or(MAX_SLEEP)
            .min(MAX_SLEEP)
    }

    /// Run all jobs that are due. A job still running from its previous turn skips this one.
    fn run_due_jobs(&mut self) {
        let now = Instant::now();
        let due: Vec<String> = self
            .next_runs
            .iter()
            .filter(|(_, next_run)| **next_run <= now)
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in due {
            if self.is_job_running(&job_id) {
                debug!("Skipping already running job: {}", job_id);
                if let Some(job) = self.jobs.get(&job_id) {
                    self.next_runs
                        .insert(job_id.clone(), now + job.schedule().interval());
                }
                continue;
            }
            self.spawn_job(&job_id);
        }
    }

    /// Spawn a job execution task.
    fn spawn_job(&mut self, job_id: &str) {
        let Some(job) = self.jobs.get(job_id).cloned() else {
            error!("Attempted to spawn unknown job: {}", job_id);
            return;
        };

        // Next turn counts from the start of this one.
        self.next_runs
            .insert(job_id.to_string(), Instant::now() + job.schedule().interval());

        // Not a child of the shutdown token: shutdown only cancels cancellable jobs.
        let cancel_token = CancellationToken::new();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = JobContext::new(cancel_token, tokio::runtime::Handle::current());

        debug!("Starting job: {}", job_id);
        let job_id_owned = job_id.to_string();

        // Spawn the job in a blocking task since jobs are synchronous
        let handle = tokio::spawn(async move {
            let start_time = std::time::Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            match result {
                Ok(Ok(())) => debug!("Job {} completed in {:?}", job_id_owned, elapsed),
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed)
                }
                Ok(Err(e)) => error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e),
                Err(e) => error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e),
            }
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    /// Clean up handles for completed jobs.
    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&job_id);
        }
    }

    /// Gracefully shut down the scheduler.
    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            let behavior = self
                .jobs
                .get(job_id)
                .map(|job| job.shutdown_behavior())
                .unwrap_or_default();
            if behavior == ShutdownBehavior::Cancellable {
                debug!("Cancelling job: {}", job_id);
                token.cancel();
            }
        }

        for (job_id, handle) in self.running_handles.drain() {
            if handle.is_finished() {
                continue;
            }
            info!("Waiting for job {} to complete...", job_id);
            let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}
