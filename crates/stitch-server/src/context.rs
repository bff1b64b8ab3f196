//! Application context shared by all route handlers via Axum state.

use std::sync::Arc;

use stitch_av::ToolRegistry;
use stitch_core::config::Config;
use stitch_core::events::JobEventLog;
use stitch_pipeline::JobRunner;

/// Central state handed to every handler.
///
/// Everything is immutable after startup and wrapped in `Arc`, so cloning is
/// cheap. Concurrent merge requests share the runner; each request still gets
/// its own job workspace.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub runner: Arc<JobRunner>,
    pub tools: Arc<ToolRegistry>,
    /// Recent job events, also fed to `tracing`.
    pub events: Arc<JobEventLog>,
}
