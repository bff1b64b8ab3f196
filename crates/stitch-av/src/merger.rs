//! Stream-copy concatenation through ffmpeg's concat demuxer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::{ToolCommand, ToolOutput};
use crate::tools::{ToolRegistry, FFMPEG};

/// Joins the files listed in a manifest into one output file.
#[async_trait]
pub trait Merger: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Run the merge and return the raw process output.
    ///
    /// A non-zero exit is not an error here; the caller decides what a failed
    /// merge means. Errors are reserved for spawn failures and cancellation.
    async fn merge(
        &self,
        manifest: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<ToolOutput>;
}

/// [`Merger`] running `ffmpeg -f concat -safe 0 -i <manifest> -c copy <output>`.
#[derive(Debug, Clone)]
pub struct FfmpegConcat {
    program: PathBuf,
}

impl FfmpegConcat {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Build from a discovered registry entry.
    pub fn from_registry(registry: &ToolRegistry) -> stitch_core::Result<Self> {
        Ok(Self::new(registry.path(FFMPEG)?.to_path_buf()))
    }
}

#[async_trait]
impl Merger for FfmpegConcat {
    fn name(&self) -> &'static str {
        FFMPEG
    }

    async fn merge(
        &self,
        manifest: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<ToolOutput> {
        ToolCommand::new(self.program.clone())
            .args(["-hide_banner", "-nostdin", "-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy"])
            .arg(output)
            .cancel_on(cancel.clone())
            .run()
            .await
    }
}

/// Render a concat-demuxer manifest: one `file '<path>'` line per input, in
/// the given order.
///
/// Single quotes inside a path are written as `'\''` (close quote, escaped
/// quote, reopen quote).
pub fn render_manifest<P: AsRef<Path>>(paths: &[P]) -> String {
    let mut manifest = String::new();
    for path in paths {
        let escaped = path.as_ref().to_string_lossy().replace('\'', r"'\''");
        manifest.push_str("file '");
        manifest.push_str(&escaped);
        manifest.push_str("'\n");
    }
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_one_line_per_file_in_order() {
        let manifest = render_manifest(&[
            PathBuf::from("/w/item_0002.mp3"),
            PathBuf::from("/w/item_0001.mp3"),
        ]);
        assert_eq!(
            manifest,
            "file '/w/item_0002.mp3'\nfile '/w/item_0001.mp3'\n"
        );
    }

    #[test]
    fn manifest_escapes_single_quotes() {
        let manifest = render_manifest(&[Path::new("/w/it's here.mp4")]);
        assert_eq!(manifest, "file '/w/it'\\''s here.mp4'\n");
    }

    #[test]
    fn manifest_empty_input() {
        let empty: [&Path; 0] = [];
        assert_eq!(render_manifest(&empty), "");
    }

    #[tokio::test]
    async fn missing_binary_is_tool_error() {
        let merger = FfmpegConcat::new(PathBuf::from("nonexistent_ffmpeg_xyz"));
        let err = merger
            .merge(
                Path::new("/tmp/manifest.txt"),
                Path::new("/tmp/out.mp4"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, stitch_core::Error::Tool { .. }));
    }
}
