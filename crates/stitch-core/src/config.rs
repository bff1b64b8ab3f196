//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, tool, and job sub-configs. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub jobs: JobsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load configuration strictly: missing or malformed files are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if !self.server.download_url_prefix.starts_with('/') {
            warnings.push(format!(
                "server.download_url_prefix '{}' does not start with '/'",
                self.server.download_url_prefix
            ));
        }

        if self.jobs.job_timeout_secs == 0 {
            warnings.push("jobs.job_timeout_secs is 0; every job will time out".into());
        }

        if self.jobs.merge_timeout_secs >= self.jobs.job_timeout_secs {
            warnings.push(format!(
                "jobs.merge_timeout_secs ({}) is not below jobs.job_timeout_secs ({}); \
                 the job deadline will fire first",
                self.jobs.merge_timeout_secs, self.jobs.job_timeout_secs
            ));
        }

        if self.jobs.max_concurrent_fetches == Some(0) {
            warnings.push(
                "jobs.max_concurrent_fetches is 0; treating it as 1".into(),
            );
        }

        if let SettleConfig::Poll {
            interval_ms,
            stable_checks,
            ..
        } = self.jobs.settle
        {
            if interval_ms == 0 {
                warnings.push("jobs.settle.interval_ms is 0; polling will spin".into());
            }
            if stable_checks == 0 {
                warnings.push("jobs.settle.stable_checks is 0; treating it as 1".into());
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory with the static web UI, served as the router fallback.
    pub static_dir: Option<PathBuf>,
    /// Where merged artifacts are published.
    pub downloads_dir: PathBuf,
    /// URL prefix under which `downloads_dir` is served.
    pub download_url_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            static_dir: Some(PathBuf::from("public")),
            downloads_dir: PathBuf::from("public/downloads"),
            download_url_prefix: "/downloads".into(),
        }
    }
}

/// Paths to external CLI tools. Unset paths are looked up in `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
}

/// Per-job limits and behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Parent of the per-job working directories.
    pub work_dir: PathBuf,
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
    #[serde(default = "default_merge_timeout")]
    pub merge_timeout_secs: u64,
    /// Cap on simultaneous item fetches; `None` fetches every item at once.
    pub max_concurrent_fetches: Option<usize>,
    /// Remove per-item files even when concatenation fails.
    pub cleanup_on_merge_failure: bool,
    pub settle: SettleConfig,
}

fn default_job_timeout() -> u64 {
    600
}

fn default_merge_timeout() -> u64 {
    300
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("data/work"),
            job_timeout_secs: default_job_timeout(),
            merge_timeout_secs: default_merge_timeout(),
            max_concurrent_fetches: None,
            cleanup_on_merge_failure: false,
            settle: SettleConfig::default(),
        }
    }
}

impl JobsConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn merge_timeout(&self) -> Duration {
        Duration::from_secs(self.merge_timeout_secs)
    }
}

/// How the pipeline waits for fetched files to become visible on storage
/// before validating them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SettleConfig {
    /// Sleep for a fixed delay.
    Fixed {
        #[serde(default = "default_fixed_delay")]
        delay_ms: u64,
    },
    /// Poll file sizes until they stop changing, bounded by `max_wait_ms`.
    Poll {
        #[serde(default = "default_poll_interval")]
        interval_ms: u64,
        #[serde(default = "default_stable_checks")]
        stable_checks: u32,
        #[serde(default = "default_max_wait")]
        max_wait_ms: u64,
    },
}

fn default_fixed_delay() -> u64 {
    5000
}
fn default_poll_interval() -> u64 {
    250
}
fn default_stable_checks() -> u32 {
    2
}
fn default_max_wait() -> u64 {
    5000
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self::Poll {
            interval_ms: default_poll_interval(),
            stable_checks: default_stable_checks(),
            max_wait_ms: default_max_wait(),
        }
    }
}
