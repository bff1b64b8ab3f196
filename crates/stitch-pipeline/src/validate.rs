//! Existence and size check for fetched files.

use std::fmt;
use std::path::Path;

use stitch_core::events::JobEvent;
use stitch_core::ValidatedFile;

use crate::context::JobContext;

/// Why a fetched file was not trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Missing,
    NotAFile,
    Empty,
    Unreadable(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("file does not exist"),
            Self::NotAFile => f.write_str("path is not a regular file"),
            Self::Empty => f.write_str("file is empty"),
            Self::Unreadable(e) => write!(f, "cannot stat file: {e}"),
        }
    }
}

/// Stat `path` and return its size if it is a non-empty regular file.
pub async fn inspect(path: &Path) -> Result<u64, Rejection> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Rejection::Missing),
        Err(e) => return Err(Rejection::Unreadable(e.to_string())),
    };

    if !meta.is_file() {
        return Err(Rejection::NotAFile);
    }
    match meta.len() {
        0 => Err(Rejection::Empty),
        size => Ok(size),
    }
}

/// Turn a fetch result's path into a [`ValidatedFile`], or `None`.
///
/// A `None` path (the fetch already failed) is filtered silently. Any other
/// rejection is logged and reported as [`JobEvent::ItemRejected`]. This never
/// fails the job.
pub async fn validate(
    ctx: &JobContext,
    ordinal: u32,
    path: Option<&Path>,
) -> Option<ValidatedFile> {
    let path = path?;

    match inspect(path).await {
        Ok(size_bytes) => Some(ValidatedFile {
            ordinal,
            path: path.to_path_buf(),
            size_bytes,
        }),
        Err(reason) => {
            tracing::debug!(ordinal, path = %path.display(), %reason, "Rejecting fetched file");
            ctx.emit(JobEvent::ItemRejected {
                ordinal,
                reason: reason.to_string(),
            });
            None
        }
    }
}
