//! # stitch-pipeline
//!
//! Orchestration of playlist merge jobs.
//!
//! This crate provides:
//!
//! - **[`Fetcher`]** -- downloads one playlist item and double-checks the file
//!   the extraction tool claims to have written.
//! - **[`validate`]** -- existence and size check run on every fetch result
//!   before it is trusted.
//! - **[`Settler`]** -- waits for fetched files to stop changing on storage.
//! - **[`Concatenator`]** -- writes the ordered manifest and runs the merger.
//! - **[`PlaylistOrchestrator`]** -- the per-job state machine from playlist
//!   resolution to the published artifact.
//! - **[`JobRunner`]** -- job deadline, workspace ownership, and mapping to a
//!   [`JobOutcome`](stitch_core::JobOutcome).

pub mod concatenator;
pub mod context;
pub mod fetcher;
pub mod orchestrator;
pub mod runner;
pub mod settle;
pub mod validate;

#[cfg(test)]
mod fakes;

// Re-export key types at the crate root.
pub use concatenator::Concatenator;
pub use context::JobContext;
pub use fetcher::Fetcher;
pub use orchestrator::{OrchestratorSettings, PlaylistOrchestrator};
pub use runner::JobRunner;
pub use settle::Settler;
pub use validate::validate;
