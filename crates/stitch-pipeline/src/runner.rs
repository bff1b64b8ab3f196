//! Job boundary: request parsing, workspace ownership, and the overall deadline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stitch_av::{FfmpegConcat, JobWorkspace, ToolRegistry, YtDlp};
use stitch_core::config::Config;
use stitch_core::events::{JobEvent, JobObserver, TracingObserver};
use stitch_core::{Error, JobId, JobOutcome, JobRequest, JobState, PlaylistRequest};
use tracing::Instrument;

use crate::context::JobContext;
use crate::orchestrator::{OrchestratorSettings, PlaylistOrchestrator};

/// Runs playlist merge jobs end to end.
///
/// Each call to [`JobRunner::run_job`] is independent: it gets its own id,
/// workspace directory, and cancellation token. The runner itself holds no
/// per-job state and can be shared between concurrent requests.
pub struct JobRunner {
    orchestrator: PlaylistOrchestrator,
    work_dir: PathBuf,
    job_timeout: Duration,
    observer: Arc<dyn JobObserver>,
}

impl JobRunner {
    pub fn new(orchestrator: PlaylistOrchestrator, work_dir: PathBuf, job_timeout: Duration) -> Self {
        Self {
            orchestrator,
            work_dir,
            job_timeout,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Build a runner backed by the real yt-dlp and ffmpeg executables.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] if either tool is missing from `tools`.
    pub fn from_config(config: &Config, tools: &ToolRegistry) -> stitch_core::Result<Self> {
        let extractor = Arc::new(YtDlp::from_registry(tools)?);
        let merger = Arc::new(FfmpegConcat::from_registry(tools)?);
        let orchestrator = PlaylistOrchestrator::new(
            extractor,
            merger,
            OrchestratorSettings::from_config(config),
        );
        Ok(Self::new(
            orchestrator,
            config.jobs.work_dir.clone(),
            config.jobs.job_timeout(),
        ))
    }

    /// Builder: report job events to `observer` instead of only tracing.
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn job_timeout(&self) -> Duration {
        self.job_timeout
    }

    /// Run one job to completion. Produces exactly one outcome.
    pub async fn run_job(&self, request: JobRequest) -> JobOutcome {
        let job_id = JobId::new();
        let span = tracing::info_span!("job", job_id = %job_id.short());
        self.execute(job_id, request).instrument(span).await
    }

    async fn execute(&self, job_id: JobId, request: JobRequest) -> JobOutcome {
        let request = match PlaylistRequest::try_from(request) {
            Ok(request) => request,
            Err(e) => return self.finish(job_id, Err(e)),
        };
        self.observer.notify(
            job_id,
            JobEvent::JobStarted {
                playlist_url: request.playlist_url.clone(),
            },
        );

        let workspace = match JobWorkspace::create(&self.work_dir, job_id) {
            Ok(ws) => ws,
            Err(e) => return self.finish(job_id, Err(e)),
        };
        let ctx = JobContext::new(workspace).with_observer(self.observer.clone());

        let result = tokio::select! {
            result = self.orchestrator.run(&request, &ctx) => result,
            _ = tokio::time::sleep(self.job_timeout) => {
                ctx.cancellation.cancel();
                ctx.set_state(JobState::Failed);
                Err(Error::JobTimeout(self.job_timeout))
            }
        };

        let leftovers = ctx.workspace.leftover_files();
        if !leftovers.is_empty() {
            ctx.emit(JobEvent::FilesLeaked { paths: leftovers });
        }
        drop(ctx);

        self.finish(job_id, result)
    }

    fn finish(
        &self,
        job_id: JobId,
        result: stitch_core::Result<stitch_core::ArtifactDescriptor>,
    ) -> JobOutcome {
        match result {
            Ok(descriptor) => {
                self.observer.notify(
                    job_id,
                    JobEvent::JobCompleted {
                        download_url: descriptor.download_url.clone(),
                        file_size: descriptor.file_size.clone(),
                    },
                );
                JobOutcome::Success(descriptor)
            }
            Err(error) => {
                self.observer.notify(
                    job_id,
                    JobEvent::JobFailed {
                        error: error.to_string(),
                    },
                );
                JobOutcome::Failure(error)
            }
        }
    }
}
