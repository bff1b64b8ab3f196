//! Per-job scratch directories.
//!
//! A [`JobWorkspace`] owns one directory under the configured work dir. All
//! per-item downloads, the concat manifest, and the unpublished merge output
//! live there, so concurrent jobs never collide on file names. The merged
//! artifact is only moved into the downloads directory once it is complete.

use std::io;
use std::path::{Path, PathBuf};

use stitch_core::{Error, JobId};
use tempfile::NamedTempFile;

/// Scratch directory for one job.
///
/// Dropping the workspace removes the directory if it is empty. Anything still
/// inside is left in place and reported as leaked.
///
/// # Example
///
/// ```no_run
/// use stitch_av::JobWorkspace;
/// use stitch_core::JobId;
///
/// let ws = JobWorkspace::create(std::path::Path::new("data/work"), JobId::new()).unwrap();
/// let item = ws.item_file(1, "mp4");
/// assert!(item.ends_with("item_0001.mp4"));
/// ```
#[derive(Debug)]
pub struct JobWorkspace {
    job_id: JobId,
    dir: PathBuf,
}

impl JobWorkspace {
    /// Create `<base>/job-<id>` (and `base` itself if needed).
    pub fn create(base: &Path, job_id: JobId) -> stitch_core::Result<Self> {
        let dir = base.join(format!("job-{job_id}"));
        // Manifest entries are resolved relative to the manifest itself, so
        // every path handed out by the workspace must be absolute.
        let dir = std::fs::create_dir_all(&dir)
            .and_then(|()| dir.canonicalize())
            .map_err(|e| {
                Error::Internal(format!(
                    "failed to create job workspace {}: {e}",
                    dir.display()
                ))
            })?;

        tracing::debug!(%job_id, dir = %dir.display(), "Created job workspace");
        Ok(Self { job_id, dir })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Path to the workspace directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Destination for the item at `ordinal` (1-based).
    pub fn item_file(&self, ordinal: u32, extension: &str) -> PathBuf {
        self.dir.join(format!("item_{ordinal:04}.{extension}"))
    }

    /// Create a path for a named temporary file inside the workspace.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Create a uniquely named concat manifest inside the workspace.
    ///
    /// The file is deleted when the returned handle is closed or dropped.
    pub fn manifest_file(&self) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix("concat-")
            .suffix(".txt")
            .tempfile_in(&self.dir)
    }

    /// Files currently present in the workspace.
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        files.sort();
        files
    }

    /// Move a finished file out of the workspace to `dest`.
    ///
    /// Tries a rename first (same filesystem). Across filesystems the file is
    /// copied to a temporary beside `dest` and renamed into place, so `dest`
    /// never holds a partial file. The parent directory of `dest` is created
    /// if missing. An existing file at `dest` is replaced.
    pub async fn publish(&self, produced: &Path, dest: &Path) -> stitch_core::Result<PathBuf> {
        if !produced.exists() {
            return Err(Error::Internal(format!(
                "output file does not exist: {}",
                produced.display()
            )));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Internal(format!(
                    "failed to create output directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        if let Err(rename_err) = tokio::fs::rename(produced, dest).await {
            tracing::debug!(
                from = %produced.display(),
                to = %dest.display(),
                "Rename failed ({rename_err}); copying instead"
            );
            let (from, to) = (produced.to_path_buf(), dest.to_path_buf());
            tokio::task::spawn_blocking(move || copy_into_place(&from, &to))
                .await
                .map_err(|e| Error::Internal(format!("publish task failed: {e}")))?
                .map_err(|e| {
                    Error::Internal(format!("failed to copy output to destination: {e}"))
                })?;
            if let Err(e) = tokio::fs::remove_file(produced).await {
                tracing::warn!(path = %produced.display(), "Failed to remove copied output: {e}");
            }
        }

        Ok(dest.to_path_buf())
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        let leftovers = self.leftover_files();
        if !leftovers.is_empty() {
            tracing::warn!(
                job_id = %self.job_id,
                dir = %self.dir.display(),
                count = leftovers.len(),
                "Job workspace not empty; leaving files in place"
            );
            return;
        }

        if let Err(e) = std::fs::remove_dir(&self.dir) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.dir.display(), "Failed to remove job workspace: {e}");
            }
        }
    }
}

/// Copy `produced` next to `dest` under a temporary name, then rename it over
/// `dest`. A failed copy leaves `dest` untouched and removes the temporary.
fn copy_into_place(produced: &Path, dest: &Path) -> io::Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".publish-")
        .tempfile_in(parent)?;
    std::fs::copy(produced, staged.path())?;
    staged.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
///
/// Returns `Ok(true)` if the file was removed and `Ok(false)` if it did not
/// exist.
pub async fn remove_file_quietly(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
