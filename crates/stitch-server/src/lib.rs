//! stitch-server: HTTP front end for playlist merge jobs.
//!
//! This crate wires the stitch-* crates into a running server. It provides:
//!
//! - Axum router with `POST /merge`, health, and operational API routes
//! - Static serving of published artifacts and the optional web UI
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use stitch_av::ToolRegistry;
use stitch_core::config::Config;
use stitch_core::events::{CompositeObserver, JobEventLog, JobObserver, TracingObserver};
use stitch_pipeline::JobRunner;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use crate::context::AppContext;

/// Build the shared [`AppContext`] from configuration.
///
/// Discovers the external tools, creates the downloads and work directories,
/// and constructs the job runner. Fails if a required tool is missing.
pub fn build_context(config: Config) -> stitch_core::Result<AppContext> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    // Discover external tools.
    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }

    for dir in [&config.server.downloads_dir, &config.jobs.work_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            tracing::info!("Created directory {}", dir.display());
        }
    }

    let events = Arc::new(JobEventLog::default());
    let observers: Vec<Arc<dyn JobObserver>> = vec![Arc::new(TracingObserver), events.clone() as Arc<dyn JobObserver>];
    let observer = CompositeObserver::new(observers);
    let runner = JobRunner::from_config(&config, &tools)?.with_observer(Arc::new(observer));

    Ok(AppContext {
        config: Arc::new(config),
        runner: Arc::new(runner),
        tools,
        events,
    })
}

/// Start the reelstitch server.
///
/// Binds `server.host:server.port` and serves until a shutdown signal is
/// received. In-flight merge requests are allowed to finish.
pub async fn start(config: Config) -> stitch_core::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| stitch_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = build_context(config)?;

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| stitch_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    serve(listener, ctx, CancellationToken::new()).await?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Serve the application on an already bound listener until `cancel` fires
/// or a shutdown signal arrives.
pub async fn serve(
    listener: TcpListener,
    ctx: AppContext,
    cancel: CancellationToken,
) -> stitch_core::Result<()> {
    let app = router::build_router(ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tools_fail_context_construction() {
        let base = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.tools.ytdlp_path = Some(base.path().join("absent-yt-dlp"));
        config.tools.ffmpeg_path = Some(base.path().join("absent-ffmpeg"));
        config.server.downloads_dir = base.path().join("downloads");
        config.jobs.work_dir = base.path().join("work");

        // The tools may still be found on PATH on a developer machine.
        if !ToolRegistry::discover(&config.tools).missing().is_empty() {
            assert!(build_context(config).is_err());
            assert!(base.path().join("downloads").is_dir());
        }
    }
}
