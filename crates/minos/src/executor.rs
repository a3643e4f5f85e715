//! Process executor for compiled projects.
//!
//! Each call spawns a brand-new JVM in its own process group, feeds the test
//! input on stdin, and collects stdout/stderr until the process exits or the
//! wall-clock limit passes. The group is killed while its leader is still
//! unreaped, both after a normal exit and on timeout, so no descendant
//! outlives the attempt and the group id cannot have been recycled.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use grader_common::{AppResult, GraderError};
use sisyphus::classpath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// One attempt at running a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Project root; used as working directory and classpath entry
    pub working_dir: PathBuf,
    /// Class to launch
    pub class_name: String,
    /// Bytes written to the program's stdin
    pub input: String,
    /// Wall-clock limit for the attempt
    pub timeout: Duration,
}

/// Captured result of a process that exited on its own
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code; `None` when terminated by a signal
    pub exit_code: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
}

impl ProcessOutput {
    fn from_status(status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            stdout,
            stderr,
            exit_code: status.code(),
            signal,
        }
    }
}

/// Result of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The process exited before the deadline
    Completed(ProcessOutput),
    /// The deadline passed and the process group was killed
    TimedOut,
}

/// Spawns one process per attempt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> AppResult<ExecutionResult>;
}

/// Executor launching compiled classes on the configured JVM
#[derive(Debug, Clone)]
pub struct JavaExecutor {
    java: Vec<String>,
    library_dir: PathBuf,
}

impl JavaExecutor {
    pub fn new(java: Vec<String>, library_dir: &Path) -> Self {
        Self {
            java,
            library_dir: classpath::absolute(library_dir),
        }
    }

    fn command(&self, request: &ExecutionRequest) -> AppResult<Command> {
        let (program, extra_args) = self
            .java
            .split_first()
            .ok_or_else(|| GraderError::ConfigError("runtime command is empty".to_string()))?;

        let runtime_classpath = classpath::join([
            request.working_dir.clone(),
            classpath::library_entry(&self.library_dir),
        ])?;

        let mut cmd = Command::new(program);
        cmd.args(extra_args)
            .arg("-cp")
            .arg(runtime_classpath)
            .arg(&request.class_name)
            .current_dir(&request.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        Ok(cmd)
    }
}

#[async_trait]
impl Executor for JavaExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> AppResult<ExecutionResult> {
        let mut child = self
            .command(request)?
            .spawn()
            .map_err(|e| GraderError::ProcessError(format!("Failed to spawn program: {e}")))?;
        let pid = child.id();

        let stdin = child.stdin.take();
        let input = request.input.clone().into_bytes();
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                // Programs may exit without draining stdin.
                if let Err(e) = stdin.write_all(&input).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        tracing::debug!("Failed to write program input: {}", e);
                    }
                }
            }
        });

        let stdout = tokio::spawn(read_stream(child.stdout.take()));
        let stderr = tokio::spawn(read_stream(child.stderr.take()));

        match timeout(request.timeout, wait_for_exit(&mut child, pid)).await {
            Ok(Ok(status)) => {
                writer.abort();
                let stdout = stdout.await.unwrap_or_default();
                let stderr = stderr.await.unwrap_or_default();
                Ok(ExecutionResult::Completed(ProcessOutput::from_status(
                    status, stdout, stderr,
                )))
            }
            Ok(Err(e)) => {
                writer.abort();
                stdout.abort();
                stderr.abort();
                Err(GraderError::ProcessError(format!(
                    "Failed to wait for program: {e}"
                )))
            }
            Err(_) => {
                tracing::debug!(pid = ?pid, "Attempt exceeded time limit, killing process group");
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    tracing::debug!("Kill after timeout failed: {}", e);
                }
                writer.abort();
                stdout.abort();
                stderr.abort();
                Ok(ExecutionResult::TimedOut)
            }
        }
    }
}

/// Wait for the leader to exit and reap it.
///
/// On Linux the exit is observed first without reaping, so stray
/// descendants still holding the pipes open are killed while the group id
/// is pinned by the zombie leader.
async fn wait_for_exit(child: &mut Child, pid: Option<u32>) -> io::Result<ExitStatus> {
    #[cfg(target_os = "linux")]
    if let Some(pid) = pid {
        match tokio::task::spawn_blocking(move || observe_exit(pid)).await {
            Ok(Ok(())) => kill_process_group(Some(pid)),
            Ok(Err(e)) => tracing::debug!(pid, "Failed to observe program exit: {}", e),
            Err(e) => tracing::debug!(pid, "Exit watcher failed: {}", e),
        }
    }

    #[cfg(not(target_os = "linux"))]
    let _ = pid;

    child.wait().await
}

/// Block until `pid` has exited, leaving it a zombie
#[cfg(target_os = "linux")]
fn observe_exit(pid: u32) -> nix::Result<()> {
    use nix::errno::Errno;
    use nix::sys::wait::{waitid, Id, WaitPidFlag};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(i32::try_from(pid).map_err(|_| Errno::EINVAL)?);
    loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Err(Errno::EINTR) => continue,
            result => return result.map(|_| ()),
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            tracing::debug!("Failed to read program output: {}", e);
        }
    }
    buf
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };

    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, "Failed to kill process group: {}", e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
