//! Per-item download with an independent check of the tool's claim.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stitch_av::{remove_file_quietly, Extractor, FormatSelection};
use stitch_core::{Error, FetchResult, ItemRef};
use tokio_util::sync::CancellationToken;

/// Downloads single playlist items through an [`Extractor`].
///
/// A fetch never errors: every problem becomes [`FetchResult::failed`] so the
/// orchestrator can drop the item and carry on with the rest. There is no
/// retry.
#[derive(Clone)]
pub struct Fetcher {
    extractor: Arc<dyn Extractor>,
}

impl Fetcher {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self { extractor }
    }

    /// Fetch `item` into `dest`.
    ///
    /// Even when the extractor reports success the destination is re-stated;
    /// a missing or empty file counts as a failure. Whatever the extractor
    /// left behind for `dest` on a failed fetch is removed, including
    /// in-progress side files such as `<dest>.part`.
    pub async fn fetch(
        &self,
        item: &ItemRef,
        selection: &FormatSelection,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> FetchResult {
        let ordinal = item.ordinal;

        if let Err(e) = self
            .extractor
            .fetch(&item.source_url, dest, selection, cancel)
            .await
        {
            let err = Error::Fetch {
                ordinal,
                message: e.to_string(),
            };
            tracing::warn!(url = %item.source_url, "{err}");
            discard_partial(dest).await;
            return FetchResult::failed(ordinal);
        }

        match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                tracing::debug!(ordinal, bytes = meta.len(), path = %dest.display(), "Item fetched");
                FetchResult::success(ordinal, dest.to_path_buf())
            }
            Ok(meta) => {
                tracing::warn!(
                    ordinal,
                    bytes = meta.len(),
                    path = %dest.display(),
                    "{} reported success but the output is empty",
                    self.extractor.name()
                );
                discard_partial(dest).await;
                FetchResult::failed(ordinal)
            }
            Err(e) => {
                tracing::warn!(
                    ordinal,
                    path = %dest.display(),
                    "{} reported success but the output is missing: {e}",
                    self.extractor.name()
                );
                FetchResult::failed(ordinal)
            }
        }
    }
}

async fn discard_partial(dest: &Path) {
    for path in partial_files(dest).await {
        match remove_file_quietly(&path).await {
            Ok(true) => tracing::debug!(path = %path.display(), "Removed partial download"),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to remove partial download: {e}")
            }
        }
    }
}

/// `dest` plus every sibling the downloader derives from its stem:
/// `<dest>.part`, `<dest>.ytdl`, and per-format fragments like
/// `<stem>.f137.mp4.part`. Item stems are unique within a workspace.
async fn partial_files(dest: &Path) -> Vec<PathBuf> {
    let mut paths = vec![dest.to_path_buf()];
    let (Some(dir), Some(stem)) = (dest.parent(), dest.file_stem()) else {
        return paths;
    };
    let prefix = format!("{}.", stem.to_string_lossy());

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), "Cannot list partial downloads: {e}");
            return paths;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if matches && path != dest {
            paths.push(path);
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeExtractor, ItemBehavior};
    use stitch_core::{FetchOutcome, OutputFormat};

    fn item(ordinal: u32) -> ItemRef {
        ItemRef {
            source_url: format!("https://example.com/v{ordinal}"),
            ordinal,
        }
    }

    fn selection() -> FormatSelection {
        FormatSelection::for_target(OutputFormat::Mp4, 720)
    }

    #[tokio::test]
    async fn successful_fetch_returns_path() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("item_0001.mp4");
        let extractor = FakeExtractor::new("t").with_item(ItemBehavior::content("abc"));
        let fetcher = Fetcher::new(Arc::new(extractor));

        let result = fetcher
            .fetch(&item(1), &selection(), &dest, &CancellationToken::new())
            .await;

        assert_eq!(result.outcome, FetchOutcome::Success);
        assert_eq!(result.local_path.as_deref(), Some(dest.as_path()));
    }

    #[tokio::test]
    async fn extractor_error_is_failed_and_partial_removed() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("item_0001.mp4");
        let extractor = FakeExtractor::new("t").with_item(ItemBehavior::FailAfterPartial);
        let fetcher = Fetcher::new(Arc::new(extractor));

        let result = fetcher
            .fetch(&item(1), &selection(), &dest, &CancellationToken::new())
            .await;

        assert!(!result.is_success());
        assert!(result.local_path.is_none());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn failed_fetch_removes_downloader_side_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("item_0001.mp4");
        let neighbour = dir.path().join("item_0002.mp4");
        std::fs::write(&neighbour, b"other item").unwrap();
        let extractor = FakeExtractor::new("t").with_item(ItemBehavior::FailLeavingSideFiles);
        let fetcher = Fetcher::new(Arc::new(extractor));

        let result = fetcher
            .fetch(&item(1), &selection(), &dest, &CancellationToken::new())
            .await;

        assert!(!result.is_success());
        let remaining: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(remaining, vec![neighbour]);
    }

    #[tokio::test]
    async fn empty_output_is_failed_despite_tool_success() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("item_0001.mp4");
        let extractor = FakeExtractor::new("t").with_item(ItemBehavior::Empty);
        let fetcher = Fetcher::new(Arc::new(extractor));

        let result = fetcher
            .fetch(&item(1), &selection(), &dest, &CancellationToken::new())
            .await;

        assert!(!result.is_success());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn missing_output_is_failed_despite_tool_success() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("item_0001.mp4");
        let extractor = FakeExtractor::new("t").with_item(ItemBehavior::NoOutput);
        let fetcher = Fetcher::new(Arc::new(extractor));

        let result = fetcher
            .fetch(&item(1), &selection(), &dest, &CancellationToken::new())
            .await;

        assert!(!result.is_success());
    }
}
