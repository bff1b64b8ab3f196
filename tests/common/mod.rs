//! Shared test harness for integration tests.
//!
//! [`Fixture`] writes fake `yt-dlp` and `ffmpeg` shell scripts into a temp
//! directory. Their behaviour is driven by files in the same directory, so a
//! test changes what the "tools" do by writing a playlist or a failure
//! marker. [`TestServer`] starts the real HTTP server on a random port with
//! those scripts configured.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use stitch_core::config::{Config, SettleConfig};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const FAKE_YTDLP: &str = r#"#!/bin/sh
DIR="__FIXTURE_DIR__"
case "$1" in
  --version) echo "2024.01.01-fake"; exit 0 ;;
esac
case " $* " in
  *" --dump-single-json "*)
    if [ ! -f "$DIR/playlist.json" ]; then
      echo "ERROR: Unsupported URL" >&2
      exit 1
    fi
    cat "$DIR/playlist.json"
    exit 0
    ;;
esac
echo "$*" >> "$DIR/fetch_args.log"
out=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) shift; out="$1" ;;
    --) shift; url="$1" ;;
  esac
  shift
done
id="${url##*/}"
if [ -f "$DIR/fail_$id" ]; then
  echo "ERROR: [$id] Video unavailable" >&2
  exit 1
fi
if [ -f "$DIR/delay_$id" ]; then
  sleep "$(cat "$DIR/delay_$id")"
fi
printf '%s|' "$id" > "$out"
"#;

const FAKE_FFMPEG: &str = r#"#!/bin/sh
DIR="__FIXTURE_DIR__"
case "$1" in
  -version) echo "ffmpeg version 6.0-fake"; exit 0 ;;
esac
manifest=""
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-i" ]; then manifest="$a"; fi
  prev="$a"
  out="$a"
done
cp "$manifest" "$DIR/last_manifest.txt"
if [ -f "$DIR/ffmpeg_fail" ]; then
  echo "[concat @ 0x0] Invalid data found when processing input" >&2
  exit 1
fi
: > "$out"
sed -n "s/^file '\(.*\)'$/\1/p" "$manifest" | while IFS= read -r f; do
  cat "$f" >> "$out"
done
"#;

/// Temp directory holding the fake tools and their control files.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create fixture dir");
        let fixture = Self { dir };
        fixture.write_script("yt-dlp", FAKE_YTDLP);
        fixture.write_script("ffmpeg", FAKE_FFMPEG);
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn ytdlp(&self) -> PathBuf {
        self.path().join("bin/yt-dlp")
    }

    pub fn ffmpeg(&self) -> PathBuf {
        self.path().join("bin/ffmpeg")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.path().join("downloads")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.path().join("work")
    }

    /// Configuration pointing at the fake tools and this fixture's dirs.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".into();
        config.server.port = 0;
        config.server.static_dir = None;
        config.server.downloads_dir = self.downloads_dir();
        config.tools.ytdlp_path = Some(self.ytdlp());
        config.tools.ffmpeg_path = Some(self.ffmpeg());
        config.jobs.work_dir = self.work_dir();
        config.jobs.job_timeout_secs = 30;
        config.jobs.merge_timeout_secs = 10;
        config.jobs.settle = SettleConfig::Poll {
            interval_ms: 20,
            stable_checks: 2,
            max_wait_ms: 1_000,
        };
        config
    }

    /// Make the fake extractor resolve a playlist with the given item ids.
    pub fn write_playlist(&self, title: &str, ids: &[&str]) {
        let entries: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "url": format!("https://example.com/watch/{id}") }))
            .collect();
        let body = json!({ "title": title, "entries": entries });
        std::fs::write(self.path().join("playlist.json"), body.to_string())
            .expect("failed to write playlist");
    }

    pub fn fail_item(&self, id: &str) {
        std::fs::write(self.path().join(format!("fail_{id}")), "").expect("failed to mark item");
    }

    pub fn delay_item(&self, id: &str, secs: f32) {
        std::fs::write(self.path().join(format!("delay_{id}")), secs.to_string())
            .expect("failed to delay item");
    }

    pub fn fail_merge(&self) {
        std::fs::write(self.path().join("ffmpeg_fail"), "").expect("failed to mark merge");
    }

    /// Argument lines of every fetch invocation.
    pub fn fetch_args(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("fetch_args.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Files named by the last concat manifest, in order.
    pub fn last_manifest(&self) -> Vec<PathBuf> {
        std::fs::read_to_string(self.path().join("last_manifest.txt"))
            .expect("no manifest recorded")
            .lines()
            .filter_map(|l| l.strip_prefix("file '")?.strip_suffix('\''))
            .map(PathBuf::from)
            .collect()
    }

    /// Job workspace directories still present under the work dir.
    pub fn job_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(self.work_dir())
            .map(|d| d.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default();
        dirs.sort();
        dirs
    }

    /// Every file under the job workspaces.
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in self.job_dirs() {
            if let Ok(entries) = std::fs::read_dir(&dir) {
                files.extend(entries.filter_map(|e| e.ok()).map(|e| e.path()));
            }
        }
        files.sort();
        files
    }

    fn write_script(&self, name: &str, template: &str) {
        let bin = self.path().join("bin");
        std::fs::create_dir_all(&bin).expect("failed to create bin dir");
        let path = bin.join(name);
        let body = template.replace("__FIXTURE_DIR__", &self.path().to_string_lossy());
        std::fs::write(&path, body).expect("failed to write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to chmod script");
    }
}

/// The real server running on a random port against a [`Fixture`].
pub struct TestServer {
    pub fixture: Fixture,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    cancel: CancellationToken,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start with a configuration tweak applied on top of the fixture's.
    pub async fn start_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let fixture = Fixture::new();
        let mut config = fixture.config();
        tweak(&mut config);

        let ctx = stitch_server::build_context(config).expect("failed to build context");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        tokio::spawn(async move {
            stitch_server::serve(listener, ctx, server_cancel).await.ok();
        });

        Self {
            fixture,
            addr,
            client: reqwest::Client::new(),
            cancel,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a merge request and return the status and JSON body.
    pub async fn merge(&self, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url("/merge"))
            .json(&body)
            .send()
            .await
            .expect("merge request failed");
        let status = resp.status().as_u16();
        let json = resp.json::<Value>().await.expect("response is not JSON");
        (status, json)
    }

    pub async fn get_bytes(&self, path: &str) -> (u16, Vec<u8>) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed");
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.expect("failed to read body").to_vec();
        (status, bytes)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
