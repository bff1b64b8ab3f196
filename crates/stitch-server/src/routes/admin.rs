//! Operational endpoints: tool availability and recent job events.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use stitch_core::events::Event;

use crate::context::AppContext;

/// Query parameters for listing recent events.
#[derive(Debug, Deserialize)]
pub struct EventsParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// External tool availability.
pub async fn tools(State(ctx): State<AppContext>) -> Json<Vec<stitch_av::ToolInfo>> {
    let infos = tokio::task::spawn_blocking(move || ctx.tools.check_all())
        .await
        .unwrap_or_default();
    Json(infos)
}

/// Most recent job events, newest first.
pub async fn events(
    State(ctx): State<AppContext>,
    Query(params): Query<EventsParams>,
) -> Json<Vec<Event>> {
    Json(ctx.events.recent_events(params.limit))
}
