//! In-process stand-ins for the extraction and concatenation tools.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use stitch_av::{Extractor, FormatSelection, Merger, ToolOutput};
use stitch_core::{Error, ItemRef, PlaylistMetadata};
use tokio_util::sync::CancellationToken;

/// What the fake extractor does when asked to fetch one item.
#[derive(Debug, Clone)]
pub(crate) enum ItemBehavior {
    /// Write `bytes` after `delay`.
    Content { bytes: Vec<u8>, delay: Duration },
    /// Report an error without touching the destination.
    Fail,
    /// Write some bytes, then report an error.
    FailAfterPartial,
    /// Leave only downloader side files (`.part`, format fragments, `.ytdl`),
    /// then report an error.
    FailLeavingSideFiles,
    /// Report success after writing an empty file.
    Empty,
    /// Report success without writing anything.
    NoOutput,
    /// Never finish unless cancelled.
    Hang,
}

impl ItemBehavior {
    pub(crate) fn content(s: &str) -> Self {
        Self::Content {
            bytes: s.as_bytes().to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn delayed(s: &str, delay: Duration) -> Self {
        Self::Content {
            bytes: s.as_bytes().to_vec(),
            delay,
        }
    }
}

pub(crate) fn item_url(ordinal: u32) -> String {
    format!("https://example.com/v{ordinal}")
}

pub(crate) struct FakeExtractor {
    title: String,
    items: Vec<ItemBehavior>,
    resolve_error: Option<String>,
    pub(crate) fetch_calls: AtomicUsize,
    pub(crate) selections: Mutex<Vec<FormatSelection>>,
}

impl FakeExtractor {
    pub(crate) fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            items: Vec::new(),
            resolve_error: None,
            fetch_calls: AtomicUsize::new(0),
            selections: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_item(mut self, behavior: ItemBehavior) -> Self {
        self.items.push(behavior);
        self
    }

    pub(crate) fn failing_resolve(mut self, message: &str) -> Self {
        self.resolve_error = Some(message.to_string());
        self
    }

    fn behaviors(&self) -> HashMap<String, &ItemBehavior> {
        self.items
            .iter()
            .zip(1u32..)
            .map(|(b, ordinal)| (item_url(ordinal), b))
            .collect()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake-extractor"
    }

    async fn resolve(
        &self,
        _playlist_url: &str,
        _cancel: &CancellationToken,
    ) -> stitch_core::Result<PlaylistMetadata> {
        if let Some(message) = &self.resolve_error {
            return Err(Error::resolution(message.clone()));
        }
        Ok(PlaylistMetadata {
            title: self.title.clone(),
            items: (1..=self.items.len() as u32)
                .map(|ordinal| ItemRef {
                    source_url: item_url(ordinal),
                    ordinal,
                })
                .collect(),
        })
    }

    async fn fetch(
        &self,
        source_url: &str,
        dest: &Path,
        selection: &FormatSelection,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<()> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.selections.lock().unwrap().push(selection.clone());

        let behavior = self
            .behaviors()
            .get(source_url)
            .map(|b| (*b).clone())
            .ok_or_else(|| Error::tool("fake", format!("unknown url {source_url}")))?;

        match behavior {
            ItemBehavior::Content { bytes, delay } => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(Error::Cancelled("fetch".into())),
                }
                tokio::fs::write(dest, bytes).await?;
                Ok(())
            }
            ItemBehavior::Fail => Err(Error::tool("fake", "HTTP Error 403: Forbidden")),
            ItemBehavior::FailAfterPartial => {
                tokio::fs::write(dest, b"part").await?;
                Err(Error::tool("fake", "connection reset"))
            }
            ItemBehavior::FailLeavingSideFiles => {
                let name = dest.file_name().unwrap().to_string_lossy().into_owned();
                let stem = dest.file_stem().unwrap().to_string_lossy().into_owned();
                let dir = dest.parent().unwrap();
                tokio::fs::write(dir.join(format!("{name}.part")), b"half").await?;
                tokio::fs::write(dir.join(format!("{name}.ytdl")), b"{}").await?;
                tokio::fs::write(dir.join(format!("{stem}.f137.mp4.part")), b"video").await?;
                Err(Error::tool("fake", "connection reset"))
            }
            ItemBehavior::Empty => {
                tokio::fs::write(dest, b"").await?;
                Ok(())
            }
            ItemBehavior::NoOutput => Ok(()),
            ItemBehavior::Hang => {
                cancel.cancelled().await;
                Err(Error::Cancelled("fetch".into()))
            }
        }
    }
}

/// What the fake merger does with a manifest.
#[derive(Debug, Clone)]
pub(crate) enum MergeMode {
    /// Concatenate the listed files into the output.
    Concat,
    /// Exit non-zero with the given stderr.
    Fail(String),
    /// Exit zero without writing output.
    NoOutput,
    /// Never finish unless cancelled or dropped.
    Hang,
}

pub(crate) struct FakeMerger {
    mode: MergeMode,
    /// Inputs listed in each manifest, in manifest order.
    pub(crate) manifests: Mutex<Vec<Vec<PathBuf>>>,
    pub(crate) manifest_paths: Mutex<Vec<PathBuf>>,
}

impl FakeMerger {
    pub(crate) fn new(mode: MergeMode) -> Self {
        Self {
            mode,
            manifests: Mutex::new(Vec::new()),
            manifest_paths: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn last_manifest(&self) -> Vec<PathBuf> {
        self.manifests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

pub(crate) fn parse_manifest(text: &str) -> Vec<PathBuf> {
    text.lines()
        .filter_map(|line| line.strip_prefix("file '")?.strip_suffix('\''))
        .map(|quoted| PathBuf::from(quoted.replace(r"'\''", "'")))
        .collect()
}

#[async_trait]
impl Merger for FakeMerger {
    fn name(&self) -> &'static str {
        "fake-merger"
    }

    async fn merge(
        &self,
        manifest: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<ToolOutput> {
        let text = tokio::fs::read_to_string(manifest).await?;
        let inputs = parse_manifest(&text);
        self.manifests.lock().unwrap().push(inputs.clone());
        self.manifest_paths
            .lock()
            .unwrap()
            .push(manifest.to_path_buf());

        match &self.mode {
            MergeMode::Concat => {
                let mut merged = Vec::new();
                for input in &inputs {
                    merged.extend(tokio::fs::read(input).await?);
                }
                tokio::fs::write(output, merged).await?;
                Ok(ToolOutput {
                    exit_code: Some(0),
                    ..Default::default()
                })
            }
            MergeMode::Fail(stderr) => Ok(ToolOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: stderr.clone(),
            }),
            MergeMode::NoOutput => Ok(ToolOutput {
                exit_code: Some(0),
                ..Default::default()
            }),
            MergeMode::Hang => {
                cancel.cancelled().await;
                Err(Error::Cancelled("merge".into()))
            }
        }
    }
}
