//! Worker channel: owns one long-lived external process per worker kind and
//! translates job intents into the wire protocol.
//!
//! The channel is single-outstanding by contract: the queue controller only
//! ever has one head payload in flight, so a new request is never written
//! while an earlier one is unanswered.

pub mod locate;
pub mod pool;
pub mod protocol;

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::JobError;
use self::protocol::{ControlAction, WorkerRequest, WorkerResponse};

/// Kinds of worker processes. At most one live process per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    /// Animation archive -> video conversion.
    AnimEncode,
}

impl WorkerKind {
    pub fn binary_stem(self) -> &'static str {
        match self {
            WorkerKind::AnimEncode => "wdm-worker",
        }
    }
}

/// A spawned worker process plus its message streams.
#[derive(Debug)]
pub struct WorkerChannel {
    kind: WorkerKind,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl WorkerChannel {
    /// Spawn the worker at `executable`. stderr is inherited so worker logs
    /// land in the host's log stream; stdout carries the protocol.
    pub fn spawn(kind: WorkerKind, executable: &Path) -> Result<Self> {
        let mut child = Command::new(executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn worker: {}", executable.display()))?;
        let stdin = child.stdin.take().context("worker stdin unavailable")?;
        let stdout = child.stdout.take().context("worker stdout unavailable")?;
        tracing::info!(kind = ?kind, "spawned worker: {}", executable.display());
        Ok(WorkerChannel {
            kind,
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    async fn send(&mut self, request: &WorkerRequest) -> Result<()> {
        let mut line = protocol::encode(request)?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .context("write to worker")?;
        self.stdin.flush().await.context("flush worker stdin")?;
        Ok(())
    }

    /// Send a new unit of work. Must not be called while another is in
    /// flight.
    pub async fn submit(&mut self, file: &Path, save_file: &Path) -> Result<()> {
        self.send(&WorkerRequest::Convert {
            file: file.to_path_buf(),
            save_file: save_file.to_path_buf(),
        })
        .await
    }

    /// Advisory abort; the worker honors it at the next frame boundary.
    pub async fn send_abort(&mut self) -> Result<()> {
        self.send(&WorkerRequest::Control {
            action: ControlAction::Abort,
        })
        .await
    }

    /// Next worker message. EOF means the process died with a request
    /// outstanding, which the protocol cannot recover from.
    pub async fn recv(&mut self) -> Result<WorkerResponse> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .context("read from worker")?
                .ok_or(JobError::WorkerGone)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(protocol::decode_response(line)?);
        }
    }

    /// Tear the process down: closing stdin ends the worker's read loop;
    /// a worker that still lingers is killed.
    pub async fn shutdown(mut self) -> Result<()> {
        drop(self.stdin);
        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(status) => {
                let status = status.context("wait for worker")?;
                tracing::debug!(kind = ?self.kind, "worker exited: {}", status);
            }
            Err(_) => {
                tracing::warn!(kind = ?self.kind, "worker did not exit, killing");
                self.child.kill().await.context("kill worker")?;
            }
        }
        Ok(())
    }
}
