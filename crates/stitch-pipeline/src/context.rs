//! Execution context shared by every stage of one job.

use std::sync::Arc;

use stitch_av::JobWorkspace;
use stitch_core::events::{JobEvent, JobObserver, TracingObserver};
use stitch_core::{JobId, JobState};
use tokio_util::sync::CancellationToken;

/// Context passed to every pipeline stage of a job.
pub struct JobContext {
    pub job_id: JobId,
    /// Scratch directory owned by this job.
    pub workspace: JobWorkspace,
    /// Cancelled when the job deadline expires; threaded to every child
    /// process so they are killed with the job.
    pub cancellation: CancellationToken,
    /// Receives state transitions and per-item results.
    pub observer: Arc<dyn JobObserver>,
}

impl JobContext {
    /// Create a context around `workspace` with a fresh token and a
    /// [`TracingObserver`].
    pub fn new(workspace: JobWorkspace) -> Self {
        Self {
            job_id: workspace.job_id(),
            workspace,
            cancellation: CancellationToken::new(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Builder: attach an observer.
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn emit(&self, event: JobEvent) {
        self.observer.notify(self.job_id, event);
    }

    /// Report a state machine transition.
    pub fn set_state(&self, state: JobState) {
        self.emit(JobEvent::StateChanged { state });
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("workspace", &self.workspace.path())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
