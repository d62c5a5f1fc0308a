//! Job lifecycle: status transitions, progress accounting, transfer stats.
//!
//! A job is mutated only by its own transition methods and by the component
//! driving it (the queue controller or the download aggregator). Progress is
//! monotone while the job is Active; it drops back to zero only on an
//! explicit reset or when an abort clears the current unit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// High-level job state. Stored as a string by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Starting,
    Active,
    Pausing,
    Paused,
    Stopping,
    Stopped,
    Finished,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Starting => "starting",
            JobStatus::Active => "active",
            JobStatus::Pausing => "pausing",
            JobStatus::Paused => "paused",
            JobStatus::Stopping => "stopping",
            JobStatus::Stopped => "stopped",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "idle" => JobStatus::Idle,
            "starting" => JobStatus::Starting,
            "active" => JobStatus::Active,
            "pausing" => JobStatus::Pausing,
            "paused" => JobStatus::Paused,
            "stopping" => JobStatus::Stopping,
            "stopped" => JobStatus::Stopped,
            "finished" => JobStatus::Finished,
            _ => JobStatus::Error,
        }
    }

    /// Terminal states accept no further transitions except `reset`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Stopped | JobStatus::Finished | JobStatus::Error
        )
    }
}

/// Completed bytes and elapsed time accumulated across resumed attempts.
/// Rate is computed on demand, never stored, so an interrupted-and-resumed
/// download reports one continuous figure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferStats {
    pub completed_bytes: u64,
    pub elapsed: Duration,
}

impl TransferStats {
    /// Fold one attempt's figures into the running totals.
    pub fn accumulate(&mut self, bytes: u64, elapsed: Duration) {
        self.completed_bytes += bytes;
        self.elapsed += elapsed;
    }

    /// Overall rate in bytes per second (0 if nothing has elapsed).
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.completed_bytes as f64 / secs
    }
}

/// A single unit of work with lifecycle state and progress.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub url: String,
    pub save_to: PathBuf,
    /// Free-form options forwarded to sub-downloads.
    pub options: HashMap<String, String>,
    status: JobStatus,
    progress: f64,
    error: Option<String>,
    saved_target: Option<PathBuf>,
    message: Option<String>,
    stats: TransferStats,
}

impl Job {
    pub fn new(id: impl Into<String>, url: impl Into<String>, save_to: impl Into<PathBuf>) -> Self {
        Job {
            id: id.into(),
            url: url.into(),
            save_to: save_to.into(),
            options: HashMap::new(),
            status: JobStatus::Idle,
            progress: 0.0,
            error: None,
            saved_target: None,
            message: None,
            stats: TransferStats::default(),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn saved_target(&self) -> Option<&Path> {
        self.saved_target.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    pub fn stats_mut(&mut self) -> &mut TransferStats {
        &mut self.stats
    }

    /// `start()` only fires from Idle or Paused; resuming continues from the
    /// current cursor rather than from zero.
    pub fn can_start(&self) -> bool {
        matches!(self.status, JobStatus::Idle | JobStatus::Paused)
    }

    /// Idle/Paused -> Starting. Returns false (and leaves the job untouched)
    /// from any other state.
    pub fn set_starting(&mut self) -> bool {
        if !self.can_start() {
            return false;
        }
        self.status = JobStatus::Starting;
        self.error = None;
        true
    }

    /// Starting -> Active (downloading or processing).
    pub fn set_active(&mut self) {
        if self.status == JobStatus::Starting {
            self.status = JobStatus::Active;
        }
    }

    /// Request-side half of pause: Starting/Active -> Pausing.
    pub fn set_pausing(&mut self) {
        if matches!(self.status, JobStatus::Starting | JobStatus::Active) {
            self.status = JobStatus::Pausing;
        }
    }

    /// Checkpoint-side half of pause: the driving loop calls this once the
    /// outstanding unit has actually stopped.
    pub fn set_paused(&mut self) {
        if matches!(
            self.status,
            JobStatus::Starting | JobStatus::Active | JobStatus::Pausing
        ) {
            self.status = JobStatus::Paused;
        }
    }

    /// Pause escalated to abandonment.
    pub fn set_stopping(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Stopping;
        }
    }

    pub fn set_stopped(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Stopped;
        }
    }

    /// Terminal success: progress is exactly 1.0 at Finished.
    pub fn set_finished(&mut self) {
        self.progress = 1.0;
        self.status = JobStatus::Finished;
        self.message = None;
    }

    /// Terminal failure carrying the error detail.
    pub fn set_error(&mut self, error: impl std::fmt::Display) {
        self.error = Some(error.to_string());
        self.status = JobStatus::Error;
    }

    /// Update progress, clamped to [0, 1]. While Active, decreases are
    /// ignored so the signal stays monotone across unit boundaries.
    pub fn set_progress(&mut self, progress: f64) {
        let p = progress.clamp(0.0, 1.0);
        if self.status == JobStatus::Active && p < self.progress {
            return;
        }
        self.progress = p;
    }

    /// Drop progress for the current unit. Only honored once the job has
    /// left Active (abort path); an active job keeps its monotone signal.
    pub fn clear_progress(&mut self) {
        if self.status != JobStatus::Active {
            self.progress = 0.0;
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Record the produced artifact's path. Set once; later calls are no-ops.
    pub fn record_saved_target(&mut self, path: impl Into<PathBuf>) {
        if self.saved_target.is_none() {
            self.saved_target = Some(path.into());
        }
    }

    /// Full reset: clears all derived fields, keeps identity and config.
    pub fn reset(&mut self) {
        self.status = JobStatus::Idle;
        self.progress = 0.0;
        self.error = None;
        self.saved_target = None;
        self.message = None;
        self.stats = TransferStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_only_from_idle_or_paused() {
        let mut job = Job::new("1", "https://example.com/w/1", "/tmp");
        assert!(job.set_starting());
        job.set_active();
        assert!(!job.set_starting());

        job.set_pausing();
        job.set_paused();
        assert!(job.set_starting());

        job.set_active();
        job.set_finished();
        assert!(!job.set_starting());
    }

    #[test]
    fn lifecycle_reaches_finished_with_full_progress() {
        let mut job = Job::new("1", "u", "/tmp");
        job.set_starting();
        job.set_active();
        job.set_progress(0.4);
        job.set_progress(0.9);
        job.set_finished();
        assert_eq!(job.status(), JobStatus::Finished);
        assert_eq!(job.progress(), 1.0);
    }

    #[test]
    fn progress_monotone_while_active() {
        let mut job = Job::new("1", "u", "/tmp");
        job.set_starting();
        job.set_active();
        job.set_progress(0.7);
        job.set_progress(0.3);
        assert_eq!(job.progress(), 0.7);
        // Out-of-range input is clamped, not rejected.
        job.set_progress(3.0);
        assert_eq!(job.progress(), 1.0);
    }

    #[test]
    fn clear_progress_only_outside_active() {
        let mut job = Job::new("1", "u", "/tmp");
        job.set_starting();
        job.set_active();
        job.set_progress(0.5);
        job.clear_progress();
        assert_eq!(job.progress(), 0.5);
        job.set_pausing();
        job.clear_progress();
        assert_eq!(job.progress(), 0.0);
    }

    #[test]
    fn error_carries_detail_and_is_terminal() {
        let mut job = Job::new("1", "u", "/tmp");
        job.set_starting();
        job.set_active();
        job.set_error("cannot resolve resource list");
        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(job.error(), Some("cannot resolve resource list"));
        assert!(!job.set_starting());
        job.set_stopped();
        assert_eq!(job.status(), JobStatus::Error);
    }

    #[test]
    fn saved_target_set_once() {
        let mut job = Job::new("1", "u", "/tmp");
        job.record_saved_target("/tmp/a.cbz");
        job.record_saved_target("/tmp/b.cbz");
        assert_eq!(job.saved_target(), Some(Path::new("/tmp/a.cbz")));
    }

    #[test]
    fn reset_keeps_identity_clears_derived_state() {
        let mut job = Job::new("42", "https://example.com/w/42", "/dl");
        job.set_starting();
        job.set_active();
        job.set_progress(0.6);
        job.record_saved_target("/dl/42.cbz");
        job.stats_mut().accumulate(1000, Duration::from_secs(2));
        job.set_error("boom");

        job.reset();
        assert_eq!(job.id, "42");
        assert_eq!(job.url, "https://example.com/w/42");
        assert_eq!(job.status(), JobStatus::Idle);
        assert_eq!(job.progress(), 0.0);
        assert!(job.error().is_none());
        assert!(job.saved_target().is_none());
        assert_eq!(job.stats().completed_bytes, 0);
    }

    #[test]
    fn transfer_stats_sum_across_attempts() {
        let mut stats = TransferStats::default();
        stats.accumulate(4_000, Duration::from_secs(2));
        stats.accumulate(6_000, Duration::from_secs(3));
        assert_eq!(stats.completed_bytes, 10_000);
        assert_eq!(stats.elapsed, Duration::from_secs(5));
        assert!((stats.bytes_per_sec() - 2_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            JobStatus::Idle,
            JobStatus::Starting,
            JobStatus::Active,
            JobStatus::Pausing,
            JobStatus::Paused,
            JobStatus::Stopping,
            JobStatus::Stopped,
            JobStatus::Finished,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), status);
        }
    }
}
