//! Wait for fetched files to become stable on storage before validation.
//!
//! Some storage backends report a download as finished before its final size
//! is visible to `stat`. [`Settler`] either sleeps for a fixed delay or polls
//! the file sizes until they stop changing.

use std::path::PathBuf;
use std::time::Duration;

use stitch_core::config::SettleConfig;
use stitch_core::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct Settler {
    mode: SettleConfig,
}

impl Settler {
    pub fn new(mode: SettleConfig) -> Self {
        Self { mode }
    }

    /// Block until `paths` are considered settled.
    ///
    /// Polling gives up quietly after `max_wait_ms`; validation then decides
    /// what to trust.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] if `cancel` fires while waiting.
    pub async fn settle(
        &self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> stitch_core::Result<()> {
        match self.mode {
            SettleConfig::Fixed { delay_ms } => {
                tracing::debug!(delay_ms, "Waiting fixed settle delay");
                pause(Duration::from_millis(delay_ms), cancel).await
            }
            SettleConfig::Poll {
                interval_ms,
                stable_checks,
                max_wait_ms,
            } => {
                if paths.is_empty() {
                    return Ok(());
                }
                self.poll(
                    paths,
                    Duration::from_millis(interval_ms.max(1)),
                    stable_checks.max(1),
                    Duration::from_millis(max_wait_ms),
                    cancel,
                )
                .await
            }
        }
    }

    async fn poll(
        &self,
        paths: &[PathBuf],
        interval: Duration,
        stable_checks: u32,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> stitch_core::Result<()> {
        let started = Instant::now();
        let mut previous = snapshot(paths).await;
        let mut stable = 0u32;

        loop {
            if started.elapsed() >= max_wait {
                tracing::debug!(
                    files = paths.len(),
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Files still changing after settle limit; continuing"
                );
                return Ok(());
            }

            pause(interval, cancel).await?;

            let current = snapshot(paths).await;
            if current == previous {
                stable += 1;
                if stable >= stable_checks {
                    tracing::debug!(
                        files = paths.len(),
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Fetched files settled"
                    );
                    return Ok(());
                }
            } else {
                stable = 0;
                previous = current;
            }
        }
    }
}

/// Current size of each path; `None` when it cannot be stat-ed.
async fn snapshot(paths: &[PathBuf]) -> Vec<Option<u64>> {
    let mut sizes = Vec::with_capacity(paths.len());
    for path in paths {
        sizes.push(tokio::fs::metadata(path).await.ok().map(|m| m.len()));
    }
    sizes
}

async fn pause(duration: Duration, cancel: &CancellationToken) -> stitch_core::Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(Error::Cancelled("settle wait".into())),
    }
}
