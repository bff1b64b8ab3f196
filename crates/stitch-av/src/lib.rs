//! # stitch-av
//!
//! External tool plumbing for the reelstitch pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to yt-dlp
//!   and ffmpeg.
//! - **Command execution** ([`ToolCommand`]) -- async builder with streamed
//!   output capture and cancellation that kills the child process.
//! - **Job workspaces** ([`JobWorkspace`]) -- one scratch directory per job,
//!   leak reporting, and atomic publication of the merged artifact.
//! - **Extraction** ([`Extractor`], [`YtDlp`]) -- playlist listing and
//!   per-item downloads.
//! - **Concatenation** ([`Merger`], [`FfmpegConcat`]) -- ffmpeg concat demuxer
//!   over an ordered manifest.

pub mod command;
pub mod extractor;
pub mod merger;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use extractor::{parse_flat_playlist, Extractor, FormatSelection, YtDlp};
pub use merger::{render_manifest, FfmpegConcat, Merger};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, FFMPEG, YTDLP};
pub use workspace::{remove_file_quietly, JobWorkspace};
