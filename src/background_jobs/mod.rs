//! Background job scheduling and execution system.
//!
//! Periodic maintenance of download jobs (expiration sweeps, status refreshes) runs here,
//! off the request path.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::JobScheduler;
