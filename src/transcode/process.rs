//! Transcoder process handle
//!
//! Owns one spawned transcoder. Stdout is handed to the caller; stderr is
//! drained in the background into debug logs, keeping the last few lines for
//! diagnostics. [`TranscoderProcess::shutdown`] is the only way the handle is
//! consumed and always reaps the child. If the handle is dropped instead,
//! tokio's `kill_on_drop` sends SIGKILL.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::error::{PlaybackError, Result};

/// Number of stderr lines kept for the pipeline report
pub const STDERR_TAIL_LINES: usize = 20;

/// How a transcoder process came to exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    /// The process had exited on its own before shutdown began
    AlreadyExited,
    /// The process exited within the grace period after SIGTERM
    Graceful,
    /// The process had to be killed
    Forced,
}

#[derive(Debug, Clone)]
pub struct ProcessExit {
    pub kind: TerminationKind,
    pub status: Option<ExitStatus>,
    pub stderr_tail: Vec<String>,
}

pub struct TranscoderProcess {
    child: Child,
    pid: Option<u32>,
    tool: String,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl TranscoderProcess {
    /// Spawn `program` with `args`, returning the handle and its stdout
    pub fn spawn(program: &Path, args: &[OsString]) -> Result<(Self, ChildStdout)> {
        let tool = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.to_string_lossy().into_owned());

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError::tool(tool.clone(), format!("failed to spawn: {e}")))?;

        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlaybackError::tool(tool.clone(), "stdout was not captured"))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_stderr(stderr, pid, stderr_tail.clone())));

        Ok((
            Self {
                child,
                pid,
                tool,
                stderr_tail,
                stderr_task,
            },
            stdout,
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn stderr_tail(&self) -> Vec<String> {
        self.stderr_tail.lock().iter().cloned().collect()
    }

    /// Stop the process: SIGTERM, wait up to `grace`, then SIGKILL. Always
    /// waits for the exit status so no zombie is left behind.
    pub async fn shutdown(mut self, grace: Duration) -> ProcessExit {
        let pid = self.pid;
        let (kind, status) = match self.child.try_wait() {
            Ok(Some(status)) => (TerminationKind::AlreadyExited, Some(status)),
            Ok(None) | Err(_) => {
                self.request_terminate();
                match tokio::time::timeout(grace, self.child.wait()).await {
                    Ok(Ok(status)) => (TerminationKind::Graceful, Some(status)),
                    Ok(Err(e)) => {
                        tracing::warn!(pid, "Error waiting for {}: {}", self.tool, e);
                        (TerminationKind::Graceful, None)
                    }
                    Err(_) => {
                        tracing::warn!(
                            pid,
                            "{} did not terminate in time, killing",
                            self.tool
                        );
                        if let Err(e) = self.child.start_kill() {
                            tracing::warn!(pid, "Failed to kill {}: {}", self.tool, e);
                        }
                        (TerminationKind::Forced, self.child.wait().await.ok())
                    }
                }
            }
        };

        // The pipe closes once the process is gone; let the drain finish so
        // the tail includes the final lines.
        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
        }

        tracing::debug!(pid, ?kind, ?status, "{} exited", self.tool);
        ProcessExit {
            kind,
            status,
            stderr_tail: self.stderr_tail(),
        }
    }

    #[cfg(unix)]
    fn request_terminate(&mut self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return;
        };
        let Ok(raw) = i32::try_from(pid) else {
            return;
        };
        if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
            tracing::debug!(pid, "SIGTERM failed: {}", e);
        }
    }

    #[cfg(not(unix))]
    fn request_terminate(&mut self) {
        let _ = self.child.start_kill();
    }
}

async fn drain_stderr(
    stderr: ChildStderr,
    pid: Option<u32>,
    tail: Arc<Mutex<VecDeque<String>>>,
) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!(pid, "transcoder: {}", line);
                let mut tail = tail.lock();
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(pid, "stderr read failed: {}", e);
                break;
            }
        }
    }
}
