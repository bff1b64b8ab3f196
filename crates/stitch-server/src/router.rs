//! Router construction.
//!
//! Builds the complete Axum [`Router`] with the merge endpoint, the downloads
//! directory, operational API routes, and static file serving.

use std::path::PathBuf;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;

/// Build the full application router.
///
/// Merged artifacts in `server.downloads_dir` are served under
/// `server.download_url_prefix`. If `server.static_dir` is set, its files are
/// the fallback for unmatched paths (SPA-style, with `index.html` for
/// unknown routes).
pub fn build_router(ctx: AppContext) -> Router {
    let server = ctx.config.server.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/tools", get(routes::admin::tools))
        .route("/events", get(routes::admin::events));

    let mut router = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/merge", post(routes::merge::merge_playlist))
        .nest("/api", api);

    match downloads_mount(&server.download_url_prefix) {
        Some(prefix) => {
            router = router.nest_service(&prefix, ServeDir::new(&server.downloads_dir));
        }
        None => tracing::warn!(
            prefix = %server.download_url_prefix,
            "Download URL prefix is not a servable path; merged files will not be served"
        ),
    }

    let router = router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    match server.static_dir {
        Some(dir) => with_static_fallback(router, dir),
        None => router,
    }
}

/// Normalise the download prefix into a nestable path, if it is one.
fn downloads_mount(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.starts_with('/') && trimmed.len() > 1 {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn with_static_fallback(router: Router, dir: PathBuf) -> Router {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "Static directory missing; UI not served");
        return router;
    }
    let index = dir.join("index.html");
    let serve_dir = ServeDir::new(&dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(index));
    router.fallback_service(serve_dir)
}
