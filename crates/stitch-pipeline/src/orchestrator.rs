//! Per-job state machine: resolve, fetch, settle, validate, concatenate,
//! clean up, describe.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use stitch_av::{remove_file_quietly, Extractor, FormatSelection, Merger};
use stitch_core::config::{Config, SettleConfig};
use stitch_core::events::JobEvent;
use stitch_core::{
    download_url, format_size_mib, sanitize_title, ArtifactDescriptor, Error, FetchResult,
    JobState, MergedArtifact, PlaylistMetadata, PlaylistRequest, ValidatedFile,
};

use crate::concatenator::Concatenator;
use crate::context::JobContext;
use crate::fetcher::Fetcher;
use crate::settle::Settler;
use crate::validate::{inspect, validate};

/// Knobs the orchestrator needs from the application config.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Where merged artifacts are published.
    pub downloads_dir: PathBuf,
    /// Prefix of the download reference returned to the caller.
    pub download_url_prefix: String,
    /// Budget for the concatenation step alone.
    pub merge_timeout: Duration,
    /// Cap on simultaneous fetches; `None` runs every fetch at once.
    pub max_concurrent_fetches: Option<usize>,
    /// Remove per-item files even when concatenation fails.
    pub cleanup_on_merge_failure: bool,
    pub settle: SettleConfig,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            downloads_dir: config.server.downloads_dir.clone(),
            download_url_prefix: config.server.download_url_prefix.clone(),
            merge_timeout: config.jobs.merge_timeout(),
            max_concurrent_fetches: config.jobs.max_concurrent_fetches,
            cleanup_on_merge_failure: config.jobs.cleanup_on_merge_failure,
            settle: config.jobs.settle,
        }
    }
}

/// Drives one playlist from URL to published artifact.
///
/// States run strictly in order: `Resolving`, `Fetching`, `Validating`,
/// `Concatenating`, `CleaningUp`, `Done`. Any error moves the job straight to
/// `Failed`; nothing is retried.
pub struct PlaylistOrchestrator {
    extractor: Arc<dyn Extractor>,
    fetcher: Fetcher,
    concatenator: Concatenator,
    settler: Settler,
    settings: OrchestratorSettings,
}

impl PlaylistOrchestrator {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        merger: Arc<dyn Merger>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            fetcher: Fetcher::new(extractor.clone()),
            extractor,
            concatenator: Concatenator::new(merger),
            settler: Settler::new(settings.settle),
            settings,
        }
    }

    /// Run the whole pipeline for `request` inside `ctx`.
    ///
    /// # Errors
    ///
    /// - [`Error::PlaylistResolution`] if the playlist cannot be listed or is empty.
    /// - [`Error::NoFilesDownloaded`] if no item survives fetch and validation.
    /// - [`Error::Concatenation`] if the merge fails or produces no output.
    /// - [`Error::MergeTimeout`] if the merge exceeds its budget.
    /// - [`Error::Cancelled`] if the job's token fires.
    pub async fn run(
        &self,
        request: &PlaylistRequest,
        ctx: &JobContext,
    ) -> stitch_core::Result<ArtifactDescriptor> {
        let result = self.drive(request, ctx).await;
        if result.is_err() {
            ctx.set_state(JobState::Failed);
        }
        result
    }

    async fn drive(
        &self,
        request: &PlaylistRequest,
        ctx: &JobContext,
    ) -> stitch_core::Result<ArtifactDescriptor> {
        ctx.set_state(JobState::Resolving);
        let playlist = self.resolve(request, ctx).await?;
        let items_total = playlist.items.len();

        ctx.set_state(JobState::Fetching);
        let results = self.fetch_all(request, &playlist, ctx).await;
        if ctx.cancellation.is_cancelled() {
            return Err(Error::Cancelled("job cancelled while fetching".into()));
        }
        let fetched: Vec<PathBuf> = results
            .iter()
            .filter_map(|r| r.local_path.clone())
            .collect();
        self.settler.settle(&fetched, &ctx.cancellation).await?;

        ctx.set_state(JobState::Validating);
        let validated = self.validate_all(&results, ctx).await;
        if validated.is_empty() {
            return Err(Error::NoFilesDownloaded);
        }
        tracing::info!(
            job_id = %ctx.job_id,
            validated = validated.len(),
            total = items_total,
            "Items ready for concatenation"
        );

        ctx.set_state(JobState::Concatenating);
        let extension = request.format.extension();
        let dest = self
            .settings
            .downloads_dir
            .join(format!("{}.{extension}", sanitize_title(&playlist.title)));
        let artifact = match self.merge_and_publish(&validated, extension, &dest, ctx).await {
            Ok(artifact) => artifact,
            Err(e) => {
                self.after_merge_failure(&validated, ctx).await;
                return Err(e);
            }
        };

        ctx.set_state(JobState::CleaningUp);
        self.cleanup(&validated, ctx).await;

        ctx.set_state(JobState::Done);
        Ok(ArtifactDescriptor {
            download_url: download_url(&self.settings.download_url_prefix, &artifact.path),
            file_size: format_size_mib(artifact.size_bytes.unwrap_or_default()),
            items_merged: validated.len(),
            items_total,
        })
    }

    async fn resolve(
        &self,
        request: &PlaylistRequest,
        ctx: &JobContext,
    ) -> stitch_core::Result<PlaylistMetadata> {
        let playlist = self
            .extractor
            .resolve(&request.playlist_url, &ctx.cancellation)
            .await
            .map_err(|e| match e {
                Error::PlaylistResolution(_) | Error::Cancelled(_) => e,
                other => Error::resolution(other.to_string()),
            })?;

        if playlist.items.is_empty() {
            return Err(Error::resolution("playlist contains no items"));
        }

        ctx.emit(JobEvent::PlaylistResolved {
            title: playlist.title.clone(),
            items: playlist.items.len(),
        });
        Ok(playlist)
    }

    /// Fetch every item concurrently and return the results in ordinal order.
    async fn fetch_all(
        &self,
        request: &PlaylistRequest,
        playlist: &PlaylistMetadata,
        ctx: &JobContext,
    ) -> Vec<FetchResult> {
        let selection = FormatSelection::for_target(request.format, request.resolution);
        let selection = &selection;
        let extension = request.format.extension();
        let limit = self
            .settings
            .max_concurrent_fetches
            .unwrap_or(playlist.items.len())
            .max(1);

        // Futures are built eagerly (but not polled) so the stream's item type
        // has no higher-ranked closure in it; this keeps the handler future `Send`.
        let fetches: Vec<_> = playlist
            .items
            .iter()
            .map(|item| async move {
                let dest = ctx.workspace.item_file(item.ordinal, extension);
                let result = self
                    .fetcher
                    .fetch(item, selection, &dest, &ctx.cancellation)
                    .await;
                ctx.emit(JobEvent::ItemFetched {
                    ordinal: item.ordinal,
                    success: result.is_success(),
                });
                result
            })
            .collect();
        let mut results: Vec<FetchResult> = stream::iter(fetches)
            .buffer_unordered(limit)
            .collect()
            .await;

        results.sort_by_key(|r| r.ordinal);
        results
    }

    async fn validate_all(&self, results: &[FetchResult], ctx: &JobContext) -> Vec<ValidatedFile> {
        let mut validated = Vec::with_capacity(results.len());
        for result in results {
            if let Some(file) = validate(ctx, result.ordinal, result.local_path.as_deref()).await {
                validated.push(file);
            }
        }
        validated
    }

    /// Merge into the workspace, measure, then move the finished file to
    /// `dest`. Nothing appears at `dest` unless every step succeeded.
    async fn merge_and_publish(
        &self,
        validated: &[ValidatedFile],
        extension: &str,
        dest: &Path,
        ctx: &JobContext,
    ) -> stitch_core::Result<MergedArtifact> {
        let staging = ctx.workspace.temp_file(&format!("merged.{extension}"));

        let merge = self
            .concatenator
            .concatenate(validated, &staging, &ctx.workspace, &ctx.cancellation);
        let merged = match tokio::time::timeout(self.settings.merge_timeout, merge).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    job_id = %ctx.job_id,
                    timeout_secs = self.settings.merge_timeout.as_secs(),
                    "Concatenation timed out; merge process killed"
                );
                return Err(Error::MergeTimeout(self.settings.merge_timeout));
            }
        };

        let size_bytes = inspect(&merged.path).await.map_err(|reason| {
            Error::concatenation(format!("merged output unusable: {reason}"), "")
        })?;

        let published = ctx.workspace.publish(&merged.path, dest).await?;
        tracing::info!(
            job_id = %ctx.job_id,
            path = %published.display(),
            bytes = size_bytes,
            "Published merged artifact"
        );

        Ok(MergedArtifact {
            path: published,
            size_bytes: Some(size_bytes),
        })
    }

    /// The unpublished merge output is always discarded. Per-item files are
    /// kept for inspection unless configured otherwise.
    async fn after_merge_failure(&self, validated: &[ValidatedFile], ctx: &JobContext) {
        for entry in ctx.workspace.leftover_files() {
            let is_staging = entry
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("merged."));
            if is_staging {
                self.remove(&entry, ctx).await;
            }
        }

        if self.settings.cleanup_on_merge_failure {
            self.cleanup(validated, ctx).await;
        } else {
            tracing::info!(
                job_id = %ctx.job_id,
                files = validated.len(),
                dir = %ctx.workspace.path().display(),
                "Keeping per-item files after failed concatenation"
            );
        }
    }

    async fn cleanup(&self, validated: &[ValidatedFile], ctx: &JobContext) {
        for file in validated {
            self.remove(&file.path, ctx).await;
        }
    }

    /// Best-effort delete; failures become [`JobEvent::CleanupWarning`].
    async fn remove(&self, path: &Path, ctx: &JobContext) {
        match remove_file_quietly(path).await {
            Ok(_) => {}
            Err(e) => ctx.emit(JobEvent::CleanupWarning {
                path: path.to_path_buf(),
                error: e.to_string(),
            }),
        }
    }
}
