//! Unified error type for reelstitch.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for the HTTP layer to derive a status code via [`Error::http_status`].

use std::time::Duration;

/// Unified error type covering every failure mode of a playlist merge job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The playlist could not be enumerated into items.
    #[error("Failed to resolve playlist: {0}")]
    PlaylistResolution(String),

    /// A single item failed to download.
    ///
    /// Never surfaced to the caller; the orchestrator filters failed items.
    #[error("Failed to fetch item {ordinal}: {message}")]
    Fetch {
        /// Playlist position of the item.
        ordinal: u32,
        /// Human-readable error description.
        message: String,
    },

    /// Every item failed to download or validate.
    #[error("No files were successfully downloaded")]
    NoFilesDownloaded,

    /// The concatenation process failed or could not be started.
    #[error("Concatenation failed: {message}")]
    Concatenation {
        /// Short description (exit status, spawn error, ...).
        message: String,
        /// Output captured from the concatenation process.
        diagnostics: String,
    },

    /// Concatenation exceeded its own time budget.
    #[error("Merge process timed out after {}s", .0.as_secs())]
    MergeTimeout(Duration),

    /// The whole job exceeded its deadline.
    #[error("Process timed out after {}s", .0.as_secs())]
    JobTimeout(Duration),

    /// An external tool (yt-dlp, ffmpeg) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The operation was cancelled before it finished.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::PlaylistResolution(_) => 422,
            Error::Fetch { .. } => 502,
            Error::NoFilesDownloaded => 422,
            Error::Concatenation { .. } => 502,
            Error::MergeTimeout(_) => 504,
            Error::JobTimeout(_) => 504,
            Error::Tool { .. } => 502,
            Error::Cancelled(_) => 503,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::PlaylistResolution(_) => "playlist_resolution_error",
            Error::Fetch { .. } => "fetch_error",
            Error::NoFilesDownloaded => "no_files_downloaded",
            Error::Concatenation { .. } => "concatenation_error",
            Error::MergeTimeout(_) => "merge_timeout",
            Error::JobTimeout(_) => "job_timeout",
            Error::Tool { .. } => "tool_error",
            Error::Cancelled(_) => "cancelled",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Concatenation`].
    pub fn concatenation(message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Error::Concatenation {
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    /// Convenience constructor for [`Error::PlaylistResolution`].
    pub fn resolution(message: impl Into<String>) -> Self {
        Error::PlaylistResolution(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
