//! Pipeline controller
//!
//! One pipeline per stream request: Starting -> Streaming -> Draining ->
//! Terminated (or Starting -> Terminated when the transcoder cannot be
//! launched). A background task moves transcoder output into a bounded
//! channel consumed through [`ByteStream`].
//!
//! While the session is paused the task does not read from the transcoder.
//! Whatever it already wrote stays in the OS pipe; once that fills, the
//! transcoder blocks on write and stops working until playback resumes.
//!
//! Every exit path (end of output, consumer dropped, read error, session
//! removed) falls through to the same process shutdown.

use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::ExitStatus;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::TranscoderConfig;
use crate::error::{PlaybackError, Result};
use crate::session::{SessionId, SessionStore};

use super::command::{build_command, TranscodeRequest};
use super::process::{TerminationKind, TranscoderProcess};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Starting,
    Streaming,
    Draining,
    Terminated,
}

/// Why a pipeline stopped streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    EndOfStream,
    ClientDisconnected,
    ReadError(String),
    SessionGone,
}

/// Outcome of one pipeline, available once its process has been reaped
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub session_id: SessionId,
    pub pid: Option<u32>,
    pub reason: ExitReason,
    pub bytes_delivered: u64,
    pub termination: TerminationKind,
    pub exit_status: Option<ExitStatus>,
    pub stderr_tail: Vec<String>,
}

/// Starts transcoder pipelines for sessions in a store
#[derive(Clone)]
pub struct PipelineController {
    store: SessionStore,
    config: TranscoderConfig,
    grace: Duration,
}

impl PipelineController {
    pub fn new(store: SessionStore, config: TranscoderConfig) -> Self {
        let grace = config.terminate_grace();
        Self {
            store,
            config,
            grace,
        }
    }

    /// Override the time allowed between SIGTERM and SIGKILL
    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Launch a transcoder for `session_id` from its current record.
    ///
    /// Fails with `SessionNotFound` for an unknown session and with
    /// `UnavailableExternalTool` when the transcoder cannot be spawned.
    pub fn start(&self, session_id: &str, media_path: &Path) -> Result<ByteStream> {
        let (state_tx, state_rx) = watch::channel(PipelineState::Starting);

        let record = self
            .store
            .get_session(session_id)
            .ok_or_else(|| PlaybackError::SessionNotFound(session_id.to_string()))?;
        let request = TranscodeRequest::from_record(media_path, &record);
        let args = build_command(&request, &self.config.output);
        tracing::debug!(session_id, "transcoder command: {:?}", args);

        let (process, stdout) = match TranscoderProcess::spawn(&self.config.ffmpeg_path, &args) {
            Ok(spawned) => spawned,
            Err(e) => {
                state_tx.send_replace(PipelineState::Terminated);
                tracing::error!(session_id, "Failed to start transcoder: {}", e);
                return Err(e);
            }
        };
        tracing::info!(
            session_id,
            pid = process.pid(),
            start = request.start_time,
            rate = request.rate,
            "Transcoder started"
        );

        let (tx, rx) = mpsc::channel(1);
        let pump = Pump {
            store: self.store.clone(),
            session_id: SessionId::from(session_id),
            stdout,
            tx,
            state: state_tx,
            chunk_size: self.config.chunk_size.max(1),
            recheck: self.config.pause_poll(),
        };
        let task = tokio::spawn(pump.run(process, self.grace));

        Ok(ByteStream {
            rx,
            state: state_rx,
            task,
        })
    }
}

enum Step {
    Chunk(usize),
    Recheck,
    Stop(ExitReason),
}

struct Pump {
    store: SessionStore,
    session_id: SessionId,
    stdout: ChildStdout,
    tx: mpsc::Sender<io::Result<Bytes>>,
    state: watch::Sender<PipelineState>,
    chunk_size: usize,
    recheck: Duration,
}

impl Pump {
    async fn run(mut self, process: TranscoderProcess, grace: Duration) -> PipelineReport {
        let pid = process.pid();
        self.state.send_replace(PipelineState::Streaming);

        let (reason, bytes_delivered) = self.stream().await;

        self.state.send_replace(PipelineState::Draining);
        match &reason {
            ExitReason::EndOfStream => {
                tracing::info!(session_id = %self.session_id, pid, "Transcoder EOF reached")
            }
            ExitReason::ClientDisconnected => {
                tracing::info!(session_id = %self.session_id, pid, "Stream closed by client")
            }
            ExitReason::ReadError(e) => {
                tracing::error!(session_id = %self.session_id, pid, "Error during streaming: {}", e)
            }
            ExitReason::SessionGone => {
                tracing::warn!(session_id = %self.session_id, pid, "Session removed while streaming")
            }
        }

        let exit = process.shutdown(grace).await;
        self.state.send_replace(PipelineState::Terminated);
        tracing::info!(
            session_id = %self.session_id,
            pid,
            bytes = bytes_delivered,
            termination = ?exit.kind,
            "Stream ended"
        );

        PipelineReport {
            session_id: self.session_id,
            pid,
            reason,
            bytes_delivered,
            termination: exit.kind,
            exit_status: exit.status,
            stderr_tail: exit.stderr_tail,
        }
    }

    async fn stream(&mut self) -> (ExitReason, u64) {
        let mut buf = vec![0u8; self.chunk_size];
        let mut delivered = 0u64;

        loop {
            // The shard lock is held only inside poll_playing, never across
            // the sleep or the read below.
            let playing = match self.store.poll_playing(self.session_id.as_str(), Utc::now()) {
                Some(playing) => playing,
                None => return (ExitReason::SessionGone, delivered),
            };

            let step = if playing {
                tokio::select! {
                    _ = self.tx.closed() => Step::Stop(ExitReason::ClientDisconnected),
                    read = self.stdout.read(&mut buf) => match read {
                        Ok(0) => Step::Stop(ExitReason::EndOfStream),
                        Ok(n) => Step::Chunk(n),
                        Err(e) => Step::Stop(ExitReason::ReadError(e.to_string())),
                    },
                    // Output is slow; look at the session again
                    _ = tokio::time::sleep(self.recheck) => Step::Recheck,
                }
            } else {
                tokio::select! {
                    _ = self.tx.closed() => Step::Stop(ExitReason::ClientDisconnected),
                    _ = tokio::time::sleep(self.recheck) => Step::Recheck,
                }
            };

            match step {
                Step::Chunk(n) => {
                    let chunk = Bytes::copy_from_slice(&buf[..n]);
                    if self.tx.send(Ok(chunk)).await.is_err() {
                        return (ExitReason::ClientDisconnected, delivered);
                    }
                    delivered += n as u64;
                }
                Step::Recheck => {}
                Step::Stop(reason) => return (reason, delivered),
            }
        }
    }
}

/// Consumer side of a pipeline.
///
/// Dropping it disconnects the pipeline, which then shuts its transcoder
/// down in the background. [`ByteStream::cancel`] does the same and waits
/// for the outcome.
pub struct ByteStream {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    state: watch::Receiver<PipelineState>,
    task: JoinHandle<PipelineReport>,
}

impl ByteStream {
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state.clone()
    }

    /// Disconnect and wait until the transcoder has been reaped
    pub async fn cancel(self) -> Option<PipelineReport> {
        let ByteStream { rx, task, .. } = self;
        drop(rx);
        match task.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!("Pipeline task failed: {}", e);
                None
            }
        }
    }
}

impl Stream for ByteStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
