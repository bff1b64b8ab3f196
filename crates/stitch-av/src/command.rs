//! Builder for executing external tool commands with cancellation.
//!
//! Output of the child process is drained line by line while it runs, so the
//! progress chatter of long downloads and merges shows up in the logs as it
//! happens and is still available to the caller afterwards.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stitch_core::Error;

/// Output captured from a tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, or `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best text to show a human when the tool failed: stderr if it said
    /// anything, stdout otherwise.
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use stitch_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> stitch_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("yt-dlp"))
///     .arg("--dump-single-json")
///     .arg("--flat-playlist")
///     .arg("https://example.com/playlist")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    cancel: Option<CancellationToken>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            cancel: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(s.as_ref().to_os_string());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, S>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(iter.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Kill the process as soon as `token` is cancelled.
    pub fn cancel_on(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel = Some(token);
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the command to completion and return whatever it produced,
    /// regardless of exit status.
    ///
    /// # Errors
    ///
    /// - [`Error::Tool`] if spawning fails.
    /// - [`Error::Cancelled`] if the cancellation token fires first; the
    ///   child is killed before returning.
    ///
    /// Deadlines belong to the caller: dropping the returned future kills the
    /// child.
    pub async fn run(&self) -> stitch_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(tool = %program_name, args = ?self.args, "Spawning tool");

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(drain(out, program_name.clone(), "stdout")));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(drain(err, program_name.clone(), "stderr")));

        let cancel = self.cancel.clone().unwrap_or_default();
        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| {
                Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
            })?,
            _ = cancel.cancelled() => {
                terminate(&mut child, &program_name).await;
                abort(stdout_task);
                abort(stderr_task);
                return Err(Error::Cancelled(format!("{program_name} was cancelled")));
            }
        };

        let output = ToolOutput {
            exit_code: status.code(),
            stdout: collect(stdout_task).await,
            stderr: collect(stderr_task).await,
        };

        tracing::debug!(tool = %program_name, exit_code = ?output.exit_code, "Tool exited");

        Ok(output)
    }

    /// Run the command and treat a non-zero exit as an error.
    ///
    /// # Errors
    ///
    /// Everything [`ToolCommand::run`] returns, plus [`Error::Tool`] carrying
    /// the captured stderr when the process exits unsuccessfully.
    pub async fn execute(&self) -> stitch_core::Result<ToolOutput> {
        let output = self.run().await?;

        if !output.success() {
            let status = output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(Error::tool(
                self.program_name(),
                format!("exited with status {status}: {}", output.diagnostics()),
            ));
        }

        Ok(output)
    }
}

/// Read a child pipe to EOF, logging each line and returning the full text.
async fn drain<R>(reader: R, tool: String, stream: &'static str) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                tracing::debug!(tool = %tool, stream, "{}", text.trim_end());
                collected.push_str(&text);
            }
            Err(e) => {
                tracing::debug!(tool = %tool, stream, "Stopped reading output: {e}");
                break;
            }
        }
    }

    collected
}

async fn collect(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

fn abort(task: Option<JoinHandle<String>>) {
    if let Some(handle) = task {
        handle.abort();
    }
}

async fn terminate(child: &mut Child, tool: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(tool, "Failed to kill process: {e}");
    }
}
