//! Child-process execution under a wall-clock deadline.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use super::process::{isolate_group, ProcessGroupGuard};
use super::request::{ExecutionMode, ExecutionRequest, Target};
use crate::config::{HarnessConfig, ToolCommand};
use crate::error::{HarnessError, Result};
use crate::obs;
use crate::workspace::Workspace;

/// Captured outcome of one child process.
///
/// `succeeded` holds iff the child exited normally with code 0 before the
/// deadline. On timeout both output buffers are empty: partial output is
/// discarded so reports never carry truncated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub succeeded: bool,

    /// Exit code; `None` when the child was killed by a signal or timed out.
    pub exit_code: Option<i32>,

    /// Terminating signal on unix, if any.
    pub signal: Option<i32>,

    pub stdout: String,
    pub stderr: String,

    /// The deadline elapsed and the child was killed.
    pub duration_exceeded: bool,

    pub duration_ms: u64,
}

impl ExecutionResult {
    fn from_status(status: ExitStatus, stdout: &[u8], stderr: &[u8], duration_ms: u64) -> Self {
        Self {
            succeeded: status.success(),
            exit_code: status.code(),
            signal: exit_signal(&status),
            stdout: String::from_utf8_lossy(stdout).to_string(),
            stderr: String::from_utf8_lossy(stderr).to_string(),
            duration_exceeded: false,
            duration_ms,
        }
    }

    fn timed_out(duration_ms: u64) -> Self {
        Self {
            succeeded: false,
            exit_code: None,
            signal: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_exceeded: true,
            duration_ms,
        }
    }

    /// stdout followed by stderr, the way test runners are usually read.
    pub fn combined_output(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    pub stdin: Option<String>,
}

/// Runs candidates, test suites and linters inside one workspace.
#[derive(Debug, Clone)]
pub struct Sandbox {
    workspace: Workspace,
    config: HarnessConfig,
}

impl Sandbox {
    pub fn new(workspace: Workspace, config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { workspace, config })
    }

    /// Open the configured workspace root and build a sandbox over it.
    pub fn from_config(config: HarnessConfig) -> Result<Self> {
        let workspace = Workspace::open(&config.workspace_root)?;
        Self::new(workspace, config)
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Execute a request in its mode with the configured toolchain.
    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let timeout = request.timeout.unwrap_or_else(|| self.config.timeout());

        // `_materialized` lives until the call returns; dropping it removes the temp file.
        let (target, _materialized): (PathBuf, Option<TempPath>) = match &request.target {
            Target::File(path) => {
                let full = self.workspace.resolve(path)?;
                if !full.is_file() {
                    return Err(HarnessError::NotFound { path: full });
                }
                (full, None)
            }
            Target::Inline { source, extension } => {
                let temp = self.materialize(source, extension)?;
                (temp.to_path_buf(), Some(temp))
            }
        };

        let tool = self.tool_for(request.mode);
        let mut args = tool.args.clone();
        args.push(target.to_string_lossy().into_owned());
        if request.mode != ExecutionMode::Lint {
            args.extend(request.args.iter().cloned());
        }

        let working_dir = match &request.working_dir {
            Some(dir) => self.workspace.resolve(dir)?,
            None if request.mode == ExecutionMode::Test => target
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.workspace.root().to_path_buf()),
            None => self.workspace.root().to_path_buf(),
        };

        let spec = CommandSpec {
            program: tool.program.clone(),
            args,
            working_dir,
            timeout,
            stdin: request.stdin.clone(),
        };
        self.execute(&spec).await
    }

    fn tool_for(&self, mode: ExecutionMode) -> &ToolCommand {
        match mode {
            ExecutionMode::Run => &self.config.interpreter,
            ExecutionMode::Test => &self.config.test_runner,
            ExecutionMode::Lint => &self.config.linter,
        }
    }

    fn materialize(&self, source: &str, extension: &str) -> Result<TempPath> {
        let root = self.workspace.root();
        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let mut file = tempfile::Builder::new()
            .prefix("fixbench-inline-")
            .suffix(&suffix)
            .tempfile_in(root)
            .map_err(|e| HarnessError::from_io(root, e))?;
        std::io::Write::write_all(&mut file, source.as_bytes())
            .map_err(|e| HarnessError::from_io(file.path(), e))?;
        Ok(file.into_temp_path())
    }

    /// Run one command line to completion or until its deadline.
    ///
    /// A non-zero exit is a normal result. Only a failure to start the
    /// program, a missing working directory, or a broken output pipe is an
    /// error. On timeout the process group gets SIGTERM, then SIGKILL after
    /// the configured grace period. When the child exits in time, anything
    /// still running in its group is killed before the output is collected.
    pub async fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if spec.timeout.is_zero() {
            return Err(HarnessError::InvalidConfig(
                "execution timeout must be greater than zero".into(),
            ));
        }
        if !spec.working_dir.is_dir() {
            return Err(HarnessError::NotFound {
                path: spec.working_dir.clone(),
            });
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        isolate_group(&mut command);

        debug!(program = %spec.program, args = ?spec.args, cwd = %spec.working_dir.display(), "spawning child");
        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| HarnessError::Launch {
            program: spec.program.clone(),
            source,
        })?;
        let mut group = ProcessGroupGuard::new(child.id());

        let feeder = tokio::spawn(feed_stdin(child.stdin.take(), spec.stdin.clone()));
        let stdout = PipeReader::spawn(child.stdout.take());
        let stderr = PipeReader::spawn(child.stderr.take());

        // Only the child itself is under the deadline. Background jobs that
        // inherited its pipes must not turn a finished run into a timeout.
        let waited = tokio::time::timeout(spec.timeout, child.wait()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match waited {
            Ok(Ok(status)) => {
                group.kill();
                feeder.abort();
                let io_err = |source| HarnessError::Io {
                    path: spec.working_dir.clone(),
                    source,
                };
                let out = stdout.finish(PIPE_DRAIN_WINDOW).await.map_err(io_err)?;
                let err = stderr.finish(PIPE_DRAIN_WINDOW).await.map_err(io_err)?;
                Ok(ExecutionResult::from_status(status, &out, &err, duration_ms))
            }
            Ok(Err(source)) => {
                feeder.abort();
                stdout.abort();
                stderr.abort();
                Err(HarnessError::Io {
                    path: spec.working_dir.clone(),
                    source,
                })
            }
            Err(_elapsed) => {
                obs::emit_timeout_kill(&spec.program, spec.timeout.as_millis() as u64);
                group.terminate();
                let grace = self.config.kill_grace();
                let _ = tokio::time::timeout(grace, child.wait()).await;
                group.kill();
                // Reaps the leader if it ignored SIGTERM.
                let _ = child.kill().await;
                feeder.abort();
                stdout.abort();
                stderr.abort();
                let duration_ms = start.elapsed().as_millis() as u64;
                Ok(ExecutionResult::timed_out(duration_ms))
            }
        }
    }
}

/// How long pipes may stay open once the child has exited and its group is gone.
const PIPE_DRAIN_WINDOW: Duration = Duration::from_millis(250);

/// Reads one child pipe on its own task, so collecting output never holds up
/// the wait on the child.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return Ok(());
            };
            let mut chunk = [0u8; 8192];
            loop {
                let n = pipe.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(());
                }
                lock(&sink).extend_from_slice(&chunk[..n]);
            }
        });
        Self { buf, task }
    }

    /// Wait up to `window` for end of file, then keep whatever was read.
    ///
    /// A pipe still held open by a process outside the group does not block
    /// the result; its output so far is returned.
    async fn finish(mut self, window: Duration) -> std::io::Result<Vec<u8>> {
        match tokio::time::timeout(window, &mut self.task).await {
            Ok(Ok(read)) => read?,
            Ok(Err(join)) => return Err(std::io::Error::new(std::io::ErrorKind::Other, join)),
            Err(_) => {
                debug!("pipe still open after the child exited");
                self.task.abort();
            }
        }
        let bytes = std::mem::take(&mut *lock(&self.buf));
        Ok(bytes)
    }

    fn abort(self) {
        self.task.abort();
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn feed_stdin(stdin: Option<ChildStdin>, input: Option<String>) {
    if let (Some(mut stdin), Some(input)) = (stdin, input) {
        // The child may exit without reading; a broken pipe is not our failure.
        if let Err(e) = stdin.write_all(input.as_bytes()).await {
            debug!(error = %e, "stdin write ended early");
        }
        // Dropping `stdin` closes it so the child sees EOF.
    }
}
