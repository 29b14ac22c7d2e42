use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Runtime the scheduler lives on. Jobs run on blocking threads and use it to drive
    /// async work to completion.
    pub runtime: Handle,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, runtime: Handle) -> Self {
        Self {
            cancellation_token,
            runtime,
        }
    }

    /// Check if cancellation has been requested.
    ///
    /// Jobs should check this between units of work and return early with
    /// `JobError::Cancelled` if true.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
