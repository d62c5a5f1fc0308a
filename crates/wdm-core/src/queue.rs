//! Work queue controller: sequential transcode payload execution.
//!
//! Holds the ordered payload list for one job, drives the head payload
//! through the worker channel, and advances on each outcome. A payload
//! failure does not halt the queue: it is logged and the controller moves
//! on, favoring forward progress over strict per-item success. Failed items
//! are not re-queued automatically.

use anyhow::Result;
use std::collections::VecDeque;
use std::path::PathBuf;

use crate::control::{AbortKind, AbortToken};
use crate::error::JobError;
use crate::job::{Job, JobStatus};
use crate::worker::pool::WorkerPool;
use crate::worker::protocol::WorkerResponse;
use crate::worker::WorkerKind;

/// A single transcode request. Identity is the (source, destination) pair;
/// equal pairs are the same logical unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl Payload {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Payload {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// What the run loop does after applying a worker response.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Keep receiving messages for the current payload.
    Continue,
    /// The current payload reached an outcome; move to the next.
    NextPayload,
    /// The job left the running state; stop driving the queue.
    Rest,
}

pub struct WorkQueue {
    job: Job,
    pending: VecDeque<Payload>,
    done_units: usize,
    abort: AbortToken,
    pool: WorkerPool,
    kind: WorkerKind,
}

impl WorkQueue {
    pub fn new(job: Job, pool: WorkerPool) -> Self {
        WorkQueue {
            job,
            pending: VecDeque::new(),
            done_units: 0,
            abort: AbortToken::new(),
            pool,
            kind: WorkerKind::AnimEncode,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Clone of the abort token, for requesting pause/stop while `start` is
    /// running in a task.
    pub fn abort_handle(&self) -> AbortToken {
        self.abort.clone()
    }

    /// Pool access for the embedding shell's shutdown hook.
    pub fn pool_mut(&mut self) -> &mut WorkerPool {
        &mut self.pool
    }

    /// Payloads not yet completed, the in-flight head included.
    pub fn jobs_left(&self) -> usize {
        self.pending.len()
    }

    pub fn status_message(&self) -> String {
        match self.pending.front() {
            Some(head) => format!("current: {}", head.source.display()),
            None => "no pending work".to_string(),
        }
    }

    /// Append a payload unless an identical pair is already queued.
    /// Duplicates are rejected silently. Chainable.
    pub fn add_payload(&mut self, payload: Payload) -> &mut Self {
        if self.pending.iter().any(|p| *p == payload) {
            return self;
        }
        self.pending.push_back(payload);
        let message = self.status_message();
        self.job.set_message(message);
        self
    }

    /// Request a cooperative pause. The in-flight payload is asked to abort
    /// at its next frame boundary; the queue is not cleared.
    pub fn pause(&mut self) {
        self.job.set_pausing();
        self.abort.request(AbortKind::Pause);
    }

    /// Pause escalated to abandonment; the job will not be resumable.
    pub fn stop(&mut self) {
        self.job.set_stopping();
        self.abort.request(AbortKind::Stop);
    }

    fn total_units(&self) -> usize {
        self.done_units + self.pending.len()
    }

    fn overall_progress(&self, unit_progress: f64) -> f64 {
        let total = self.total_units();
        if total == 0 {
            return 1.0;
        }
        (self.done_units as f64 + unit_progress.clamp(0.0, 1.0)) / total as f64
    }

    /// The head payload reached an outcome: count it, drop it, finish the
    /// job once nothing is left. The head is never removed before this.
    fn advance(&mut self) {
        self.pending.pop_front();
        self.done_units += 1;
        let progress = self.overall_progress(0.0);
        self.job.set_progress(progress);
        if self.pending.is_empty() {
            self.job.set_finished();
        }
    }

    /// Apply one worker message to the queue state machine.
    fn apply_response(&mut self, response: WorkerResponse) -> Step {
        match response {
            WorkerResponse::Progress { progress } => {
                let overall = self.overall_progress(progress);
                self.job.set_progress(overall);
                Step::Continue
            }
            WorkerResponse::Finish => {
                tracing::debug!(job = %self.job.id, "payload finished");
                self.advance();
                if self.pending.is_empty() {
                    Step::Rest
                } else {
                    Step::NextPayload
                }
            }
            WorkerResponse::Error { message } => {
                tracing::warn!(job = %self.job.id, "{}", JobError::Transcode(message.clone()));
                self.job.set_message(message);
                self.advance();
                if self.pending.is_empty() {
                    Step::Rest
                } else {
                    Step::NextPayload
                }
            }
            WorkerResponse::Abort => {
                let kind = self.abort.requested().unwrap_or(AbortKind::Pause);
                self.rest_on_abort(kind);
                self.job.clear_progress();
                Step::Rest
            }
        }
    }

    fn rest_on_abort(&mut self, kind: AbortKind) {
        match kind {
            AbortKind::Pause => self.job.set_paused(),
            AbortKind::Stop => {
                self.job.set_stopping();
                self.job.set_stopped();
            }
        }
    }

    /// Drive the queue until it rests (Finished, Paused, or Stopped). A
    /// no-op unless the job is Idle or Paused with pending work; resuming
    /// picks up at the preserved head payload.
    pub async fn start(&mut self) -> Result<()> {
        if self.pending.is_empty() || !self.job.can_start() {
            return Ok(());
        }
        self.abort.clear();
        self.job.set_starting();
        self.job.set_active();
        let abort = self.abort.clone();

        'payloads: while self.job.status() == JobStatus::Active {
            let head = match self.pending.front() {
                Some(head) => head.clone(),
                None => break,
            };
            if let Some(kind) = abort.requested() {
                self.rest_on_abort(kind);
                return Ok(());
            }

            // Already produced earlier; count it and move on without
            // touching the worker.
            if head.destination.exists() {
                tracing::debug!(
                    "output already exists, skipping: {}",
                    head.destination.display()
                );
                self.advance();
                continue;
            }

            {
                let channel = self.pool.channel(self.kind)?;
                if let Err(e) = channel.submit(&head.source, &head.destination).await {
                    // The worker died before accepting the request: count the
                    // unit as a failure and respawn for the next one.
                    tracing::warn!(job = %self.job.id, "worker rejected payload: {:#}", e);
                    self.pool.discard(self.kind);
                    self.advance();
                    continue 'payloads;
                }
            }

            let mut abort_sent = false;
            loop {
                if abort.is_requested() && !abort_sent {
                    let delivered = {
                        let channel = self.pool.channel(self.kind)?;
                        channel.send_abort().await
                    };
                    if let Err(e) = delivered {
                        // A dead worker cannot honor the abort; rest anyway,
                        // head retained.
                        tracing::warn!(job = %self.job.id, "abort not delivered: {:#}", e);
                        self.pool.discard(self.kind);
                        self.rest_on_abort(abort.requested().unwrap_or(AbortKind::Pause));
                        return Ok(());
                    }
                    abort_sent = true;
                }
                let received = {
                    let channel = self.pool.channel(self.kind)?;
                    if abort_sent {
                        channel.recv().await
                    } else {
                        tokio::select! {
                            response = channel.recv() => response,
                            _ = abort.aborted() => continue,
                        }
                    }
                };
                let response = match received {
                    Ok(response) => response,
                    Err(e) => {
                        // The worker died mid-payload: count the unit as a
                        // failure and respawn for the next one.
                        tracing::warn!(job = %self.job.id, "worker channel failed: {:#}", e);
                        self.pool.discard(self.kind);
                        self.advance();
                        continue 'payloads;
                    }
                };
                match self.apply_response(response) {
                    Step::Continue => {}
                    Step::NextPayload => continue 'payloads,
                    Step::Rest => return Ok(()),
                }
            }
        }

        // The job left Active without a worker round-trip (a pause or stop
        // raced with the last completion).
        if let Some(kind) = abort.requested() {
            self.rest_on_abort(kind);
        }
        Ok(())
    }
}
