//! Playlist listing and per-item downloads.
//!
//! [`Extractor`] is the seam the pipeline fetches through; [`YtDlp`] is the
//! production implementation. Tests substitute their own extractor.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use stitch_core::{Error, ItemRef, OutputFormat, PlaylistMetadata};

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, YTDLP};

/// Title used when the playlist listing carries none.
const UNTITLED: &str = "playlist";

// ---------------------------------------------------------------------------
// FormatSelection
// ---------------------------------------------------------------------------

/// How an item should be downloaded to land in the target format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    pub format: OutputFormat,
    /// yt-dlp `-f` selector expression.
    pub selector: String,
    /// Audio codec to extract to, for audio-only targets.
    pub audio_format: Option<&'static str>,
    /// Container to remux merged video+audio streams into.
    pub merge_container: Option<&'static str>,
}

impl FormatSelection {
    /// Selection for `format`, capping video height at `resolution` pixels.
    ///
    /// Audio-only targets ignore the resolution.
    pub fn for_target(format: OutputFormat, resolution: u32) -> Self {
        if format.is_audio_only() {
            Self {
                format,
                selector: "bestaudio/best".to_string(),
                audio_format: Some(format.extension()),
                merge_container: None,
            }
        } else {
            Self {
                format,
                selector: format!(
                    "bestvideo[height<={resolution}]+bestaudio/best[height<={resolution}]"
                ),
                audio_format: None,
                merge_container: Some(format.extension()),
            }
        }
    }

    /// Command-line arguments expressing this selection.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-f".to_string(), self.selector.clone()];
        if let Some(codec) = self.audio_format {
            args.extend(["-x".to_string(), "--audio-format".to_string(), codec.to_string()]);
        }
        if let Some(container) = self.merge_container {
            args.extend(["--merge-output-format".to_string(), container.to_string()]);
        }
        args
    }
}

// ---------------------------------------------------------------------------
// Extractor trait
// ---------------------------------------------------------------------------

/// Lists playlists and downloads their items.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Enumerate the playlist at `playlist_url` without downloading media.
    ///
    /// # Errors
    ///
    /// [`Error::PlaylistResolution`] when the URL is not a playlist or the
    /// listing cannot be parsed; [`Error::Cancelled`] on cancellation.
    async fn resolve(
        &self,
        playlist_url: &str,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<PlaylistMetadata>;

    /// Download one item to `dest` in the selected format.
    ///
    /// A returned `Ok` only means the tool reported success; callers must still
    /// check that `dest` exists.
    async fn fetch(
        &self,
        source_url: &str,
        dest: &Path,
        selection: &FormatSelection,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<()>;
}

// ---------------------------------------------------------------------------
// yt-dlp
// ---------------------------------------------------------------------------

/// [`Extractor`] backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Build from a discovered registry entry.
    pub fn from_registry(registry: &ToolRegistry) -> stitch_core::Result<Self> {
        Ok(Self::new(registry.path(YTDLP)?.to_path_buf()))
    }

    fn resolve_args(playlist_url: &str) -> Vec<String> {
        vec![
            "--dump-single-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--".to_string(),
            playlist_url.to_string(),
        ]
    }

    fn fetch_args(source_url: &str, dest: &Path, selection: &FormatSelection) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "-o".to_string(),
            dest.to_string_lossy().into_owned(),
        ];
        args.extend(selection.to_args());
        args.push("--".to_string());
        args.push(source_url.to_string());
        args
    }
}

#[async_trait]
impl Extractor for YtDlp {
    fn name(&self) -> &'static str {
        YTDLP
    }

    async fn resolve(
        &self,
        playlist_url: &str,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<PlaylistMetadata> {
        let output = ToolCommand::new(self.program.clone())
            .args(Self::resolve_args(playlist_url))
            .cancel_on(cancel.clone())
            .run()
            .await
            .map_err(|e| match e {
                Error::Cancelled(_) => e,
                other => Error::resolution(other.to_string()),
            })?;

        if !output.success() {
            return Err(Error::resolution(format!(
                "{YTDLP} exited with status {:?}: {}",
                output.exit_code,
                output.diagnostics()
            )));
        }

        parse_flat_playlist(&output.stdout)
    }

    async fn fetch(
        &self,
        source_url: &str,
        dest: &Path,
        selection: &FormatSelection,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<()> {
        ToolCommand::new(self.program.clone())
            .args(Self::fetch_args(source_url, dest, selection))
            .cancel_on(cancel.clone())
            .execute()
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Listing JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    title: Option<String>,
    entries: Option<Vec<Option<FlatEntry>>>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    url: Option<String>,
    webpage_url: Option<String>,
}

/// Parse the output of `yt-dlp --dump-single-json --flat-playlist`.
///
/// Ordinals follow the listing order starting at 1. Entries without a usable
/// URL are skipped but still consume their ordinal, so the remaining items
/// keep their playlist positions.
///
/// # Errors
///
/// [`Error::PlaylistResolution`] if the JSON is malformed or has no
/// `entries` array (the URL points at a single video, not a playlist).
pub fn parse_flat_playlist(json: &str) -> stitch_core::Result<PlaylistMetadata> {
    let listing: FlatPlaylist = serde_json::from_str(json)
        .map_err(|e| Error::resolution(format!("unreadable playlist listing: {e}")))?;

    let entries = listing
        .entries
        .ok_or_else(|| Error::resolution("URL does not point to a playlist"))?;

    let items = entries
        .into_iter()
        .zip(1u32..)
        .filter_map(|(entry, ordinal)| {
            let entry = entry?;
            let source_url = entry
                .url
                .or(entry.webpage_url)
                .filter(|u| !u.trim().is_empty());
            if source_url.is_none() {
                tracing::debug!(ordinal, "Skipping playlist entry without a URL");
            }
            source_url.map(|source_url| ItemRef {
                source_url,
                ordinal,
            })
        })
        .collect();

    let title = listing
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    Ok(PlaylistMetadata { title, items })
}
