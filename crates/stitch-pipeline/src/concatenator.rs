//! Ordered concatenation of validated files into one artifact.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use stitch_av::{render_manifest, JobWorkspace, Merger};
use stitch_core::{Error, MergedArtifact, ValidatedFile};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// Runs a [`Merger`] over an ordered manifest of validated files.
#[derive(Clone)]
pub struct Concatenator {
    merger: Arc<dyn Merger>,
}

impl Concatenator {
    pub fn new(merger: Arc<dyn Merger>) -> Self {
        Self { merger }
    }

    /// Merge `files`, in the order given, into `output`.
    ///
    /// The manifest is written to a uniquely named file inside `workspace` and
    /// removed once the merge process has exited, whatever the outcome. The
    /// returned artifact is unmeasured; checking the output is the caller's
    /// job.
    ///
    /// # Errors
    ///
    /// [`Error::Concatenation`] when `files` is empty, the manifest cannot be
    /// written, the merger cannot be started, or it exits non-zero. The
    /// error's diagnostics carry the merger's captured output.
    /// [`Error::Cancelled`] when `cancel` fires during the merge.
    pub async fn concatenate(
        &self,
        files: &[ValidatedFile],
        output: &Path,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<MergedArtifact> {
        if files.is_empty() {
            return Err(Error::concatenation("no input files to concatenate", ""));
        }

        let manifest = write_manifest(files, workspace)?;
        tracing::info!(
            files = files.len(),
            manifest = %manifest.path().display(),
            output = %output.display(),
            "Starting {}",
            self.merger.name()
        );

        let result = self.merger.merge(manifest.path(), output, cancel).await;
        release_manifest(manifest);

        let merged = match result {
            Ok(merged) => merged,
            Err(Error::Cancelled(reason)) => return Err(Error::Cancelled(reason)),
            Err(e) => {
                return Err(Error::concatenation(
                    format!("failed to run {}", self.merger.name()),
                    e.to_string(),
                ))
            }
        };

        if !merged.success() {
            let status = merged
                .exit_code
                .map(|c| format!("exited with code {c}"))
                .unwrap_or_else(|| "was terminated by a signal".to_string());
            return Err(Error::concatenation(
                format!("{} {status}", self.merger.name()),
                merged.diagnostics(),
            ));
        }

        Ok(MergedArtifact::unmeasured(output))
    }
}

fn write_manifest(
    files: &[ValidatedFile],
    workspace: &JobWorkspace,
) -> stitch_core::Result<NamedTempFile> {
    let paths: Vec<&Path> = files.iter().map(|f| f.path.as_path()).collect();
    let contents = render_manifest(&paths);

    let mut manifest = workspace
        .manifest_file()
        .map_err(|e| Error::concatenation(format!("failed to create manifest: {e}"), ""))?;
    manifest
        .write_all(contents.as_bytes())
        .and_then(|()| manifest.flush())
        .map_err(|e| Error::concatenation(format!("failed to write manifest: {e}"), ""))?;

    Ok(manifest)
}

fn release_manifest(manifest: NamedTempFile) {
    let path = manifest.path().to_path_buf();
    if let Err(e) = manifest.close() {
        tracing::warn!(path = %path.display(), "Failed to remove concat manifest: {e}");
    }
}
