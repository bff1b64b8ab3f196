//! Job-scoped domain model: requests, playlist items, fetch results, and the
//! final artifact descriptor.
//!
//! Every value here lives for exactly one job; nothing is persisted across
//! requests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::media::{OutputFormat, RawResolution, DEFAULT_RESOLUTION};
use crate::{Error, Result};

/// Name used when a playlist title sanitizes to nothing.
const FALLBACK_TITLE: &str = "playlist";

static UNSAFE_TITLE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9]").expect("static regex is valid")
});

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Job request as received from the HTTP layer or the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub playlist_url: String,
    pub format: String,
    #[serde(default)]
    pub resolution: Option<RawResolution>,
}

/// Validated, immutable request for one playlist merge job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRequest {
    pub playlist_url: String,
    pub format: OutputFormat,
    /// Maximum vertical pixel count for video formats.
    pub resolution: u32,
}

impl TryFrom<JobRequest> for PlaylistRequest {
    type Error = Error;

    fn try_from(raw: JobRequest) -> Result<Self> {
        let playlist_url = raw.playlist_url.trim().to_string();
        if playlist_url.is_empty() {
            return Err(Error::Validation("playlistUrl is required".into()));
        }

        let format = raw.format.parse::<OutputFormat>()?;
        let resolution = match raw.resolution {
            Some(r) => r.to_height()?,
            None => DEFAULT_RESOLUTION,
        };

        Ok(Self {
            playlist_url,
            format,
            resolution,
        })
    }
}

// ---------------------------------------------------------------------------
// Playlist items and fetch results
// ---------------------------------------------------------------------------

/// One entry of a resolved playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub source_url: String,
    /// 1-based position within the playlist.
    pub ordinal: u32,
}

/// Title and ordered items of a resolved playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistMetadata {
    pub title: String,
    pub items: Vec<ItemRef>,
}

/// Whether a single fetch produced a usable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchOutcome {
    Success,
    Failed,
}

/// Result of fetching one [`ItemRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub ordinal: u32,
    /// Present only for [`FetchOutcome::Success`].
    pub local_path: Option<PathBuf>,
    pub outcome: FetchOutcome,
}

impl FetchResult {
    pub fn success(ordinal: u32, path: PathBuf) -> Self {
        Self {
            ordinal,
            local_path: Some(path),
            outcome: FetchOutcome::Success,
        }
    }

    pub fn failed(ordinal: u32) -> Self {
        Self {
            ordinal,
            local_path: None,
            outcome: FetchOutcome::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == FetchOutcome::Success
    }
}

/// A fetched file that exists on disk and is not empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFile {
    pub ordinal: u32,
    pub path: PathBuf,
    /// Always greater than zero.
    pub size_bytes: u64,
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// The merged output file.
///
/// The concatenator creates it unmeasured; the orchestrator fills in the size
/// once it has checked the file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedArtifact {
    pub path: PathBuf,
    pub size_bytes: Option<u64>,
}

impl MergedArtifact {
    pub fn unmeasured(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size_bytes: None,
        }
    }
}

/// Success payload returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    /// Path-relative reference to the merged artifact (e.g. `/downloads/mix.mp4`).
    pub download_url: String,
    /// Size in mebibytes with two fraction digits.
    pub file_size: String,
    pub items_merged: usize,
    pub items_total: usize,
}

/// Terminal result of one job.
#[derive(Debug)]
pub enum JobOutcome {
    Success(ArtifactDescriptor),
    Failure(Error),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<ArtifactDescriptor> {
        match self {
            Self::Success(descriptor) => Ok(descriptor),
            Self::Failure(err) => Err(err),
        }
    }
}

/// Orchestrator state machine for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Resolving,
    Fetching,
    Validating,
    Concatenating,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Validating => "validating",
            Self::Concatenating => "concatenating",
            Self::CleaningUp => "cleaning_up",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Turn a playlist title into a file stem: every character outside
/// `[A-Za-z0-9]` becomes one `_` per UTF-16 code unit, then the result is
/// lowercased. Characters outside the Basic Multilingual Plane (most emoji)
/// therefore become `__`, keeping names stable for clients that count in
/// UTF-16.
pub fn sanitize_title(title: &str) -> String {
    let sanitized = UNSAFE_TITLE_CHARS
        .replace_all(title, |caps: &Captures<'_>| {
            let units: usize = caps[0].chars().map(char::len_utf16).sum();
            "_".repeat(units)
        })
        .to_lowercase();
    if sanitized.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        sanitized
    }
}

/// Format a byte count as mebibytes (1024²) with two fraction digits.
pub fn format_size_mib(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

/// Build the caller-facing download reference from the artifact's base name.
pub fn download_url(prefix: &str, artifact: &Path) -> String {
    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", prefix.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(url: &str, format: &str, resolution: Option<RawResolution>) -> JobRequest {
        JobRequest {
            playlist_url: url.into(),
            format: format.into(),
            resolution,
        }
    }

    #[test]
    fn request_parses_camel_case_json() {
        let json = r#"{"playlistUrl":"https://example.com/list","format":"mp4","resolution":"720"}"#;
        let req: JobRequest = serde_json::from_str(json).unwrap();
        let parsed = PlaylistRequest::try_from(req).unwrap();
        assert_eq!(parsed.playlist_url, "https://example.com/list");
        assert_eq!(parsed.format, OutputFormat::Mp4);
        assert_eq!(parsed.resolution, 720);
    }

    #[test]
    fn request_defaults_resolution() {
        let parsed = PlaylistRequest::try_from(raw("https://x/list", "mp3", None)).unwrap();
        assert_eq!(parsed.resolution, DEFAULT_RESOLUTION);
    }

    #[test]
    fn request_rejects_empty_url() {
        let err = PlaylistRequest::try_from(raw("  ", "mp4", None)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn request_rejects_unknown_format() {
        let err = PlaylistRequest::try_from(raw("https://x/list", "gif", None)).unwrap_err();
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn sanitize_matches_download_naming() {
        assert_eq!(sanitize_title("My Mix!"), "my_mix_");
        assert_eq!(sanitize_title("Lo-Fi Beats 2024"), "lo_fi_beats_2024");
        assert_eq!(sanitize_title("ALLCAPS"), "allcaps");
        assert_eq!(sanitize_title("Café"), "caf_");
        assert_eq!(sanitize_title("Road 🎵 Trip"), "road____trip");
        assert_eq!(sanitize_title("😀"), "__");
        assert_eq!(sanitize_title(""), "playlist");
    }

    #[test]
    fn size_in_mebibytes() {
        assert_eq!(format_size_mib(0), "0.00");
        assert_eq!(format_size_mib(1024 * 1024), "1.00");
        assert_eq!(format_size_mib(1536 * 1024), "1.50");
        assert_eq!(format_size_mib(10_000_000), "9.54");
    }

    #[test]
    fn download_url_uses_base_name() {
        let url = download_url("/downloads/", Path::new("/srv/public/downloads/mix.mp4"));
        assert_eq!(url, "/downloads/mix.mp4");
    }

    #[test]
    fn fetch_result_constructors() {
        let ok = FetchResult::success(2, PathBuf::from("/tmp/item_0002.mp4"));
        assert!(ok.is_success());
        assert_eq!(ok.local_path.as_deref(), Some(Path::new("/tmp/item_0002.mp4")));

        let failed = FetchResult::failed(3);
        assert!(!failed.is_success());
        assert!(failed.local_path.is_none());
    }

    #[test]
    fn descriptor_serializes_camel_case() {
        let d = ArtifactDescriptor {
            download_url: "/downloads/a.mp4".into(),
            file_size: "1.00".into(),
            items_merged: 2,
            items_total: 3,
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["downloadUrl"], "/downloads/a.mp4");
        assert_eq!(json["fileSize"], "1.00");
        assert_eq!(json["itemsMerged"], 2);
        assert_eq!(json["itemsTotal"], 3);
    }

    #[test]
    fn outcome_into_result() {
        let ok = JobOutcome::Success(ArtifactDescriptor {
            download_url: "/downloads/a.mp3".into(),
            file_size: "0.01".into(),
            items_merged: 1,
            items_total: 1,
        });
        assert!(ok.is_success());
        assert!(ok.into_result().is_ok());

        let failed = JobOutcome::Failure(Error::NoFilesDownloaded);
        assert!(matches!(failed.into_result(), Err(Error::NoFilesDownloaded)));
    }
}
