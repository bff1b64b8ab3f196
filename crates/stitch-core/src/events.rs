//! Job event system.
//!
//! The pipeline never logs through a process-wide sink of its own: every job
//! carries a [`JobObserver`] and reports state transitions, per-item results,
//! and cleanup problems through it. [`TracingObserver`] turns events into
//! structured `tracing` records, [`JobEventLog`] keeps a bounded ring buffer
//! of recent events, and [`CompositeObserver`] fans out to several observers.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::JobId;
use crate::job::JobState;

/// Maximum number of events retained by a [`JobEventLog`] by default.
const MAX_RECENT_EVENTS: usize = 256;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// Payload describing what happened during a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    JobStarted {
        playlist_url: String,
    },
    StateChanged {
        state: JobState,
    },
    PlaylistResolved {
        title: String,
        items: usize,
    },
    ItemFetched {
        ordinal: u32,
        success: bool,
    },
    ItemRejected {
        ordinal: u32,
        reason: String,
    },
    /// Non-fatal: a temporary file could not be removed.
    CleanupWarning {
        path: PathBuf,
        error: String,
    },
    /// Temporary files still on disk when the job ended.
    FilesLeaked {
        paths: Vec<PathBuf>,
    },
    JobCompleted {
        download_url: String,
        file_size: String,
    },
    JobFailed {
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event attributed to one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    pub job_id: JobId,
    pub payload: JobEvent,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(job_id: JobId, payload: JobEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            job_id,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Receives job events. Implementations must be cheap and must not block.
pub trait JobObserver: Send + Sync {
    fn notify(&self, job_id: JobId, event: JobEvent);
}

/// Emits every event as a `tracing` record at a level matching its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn notify(&self, job_id: JobId, event: JobEvent) {
        match event {
            JobEvent::JobStarted { playlist_url } => {
                tracing::info!(%job_id, %playlist_url, "Job started");
            }
            JobEvent::StateChanged { state } => {
                tracing::debug!(%job_id, %state, "Job state changed");
            }
            JobEvent::PlaylistResolved { title, items } => {
                tracing::info!(%job_id, %title, items, "Playlist resolved");
            }
            JobEvent::ItemFetched { ordinal, success } => {
                tracing::info!(%job_id, ordinal, success, "Item fetch finished");
            }
            JobEvent::ItemRejected { ordinal, reason } => {
                tracing::warn!(%job_id, ordinal, %reason, "Item rejected");
            }
            JobEvent::CleanupWarning { path, error } => {
                tracing::warn!(%job_id, path = %path.display(), %error, "Cleanup failed");
            }
            JobEvent::FilesLeaked { paths } => {
                tracing::warn!(%job_id, count = paths.len(), ?paths, "Temporary files left on disk");
            }
            JobEvent::JobCompleted {
                download_url,
                file_size,
            } => {
                tracing::info!(%job_id, %download_url, %file_size, "Job completed");
            }
            JobEvent::JobFailed { error } => {
                tracing::error!(%job_id, %error, "Job failed");
            }
        }
    }
}

/// Bounded ring buffer of recent events (newest first).
pub struct JobEventLog {
    capacity: usize,
    recent: RwLock<VecDeque<Event>>,
}

impl JobEventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            recent: RwLock::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }

    /// All retained events for one job, oldest first.
    pub fn events_for(&self, job_id: JobId) -> Vec<JobEvent> {
        let recent = self.recent.read();
        recent
            .iter()
            .rev()
            .filter(|e| e.job_id == job_id)
            .map(|e| e.payload.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.recent.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.read().is_empty()
    }
}

impl Default for JobEventLog {
    fn default() -> Self {
        Self::new(MAX_RECENT_EVENTS)
    }
}

impl JobObserver for JobEventLog {
    fn notify(&self, job_id: JobId, event: JobEvent) {
        let mut recent = self.recent.write();
        if recent.len() >= self.capacity {
            recent.pop_back();
        }
        recent.push_front(Event::new(job_id, event));
    }
}

/// Forwards every event to each wrapped observer in order.
#[derive(Clone, Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn JobObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn JobObserver>>) -> Self {
        Self { observers }
    }

    pub fn with(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl JobObserver for CompositeObserver {
    fn notify(&self, job_id: JobId, event: JobEvent) {
        for observer in &self.observers {
            observer.notify(job_id, event.clone());
        }
    }
}
