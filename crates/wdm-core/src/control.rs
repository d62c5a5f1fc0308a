//! Cooperative cancellation: shared abort tokens checked at safe checkpoints.
//!
//! A pause/stop request sets the token; the running loop observes it before
//! the next resource request or on the next worker message and transitions
//! the job itself. Nothing is interrupted mid-flight.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Error returned when a transfer is stopped by the user (pause/cancel).
#[derive(Debug)]
pub struct JobAborted;

impl std::fmt::Display for JobAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job aborted by user")
    }
}

impl std::error::Error for JobAborted {}

/// What an abort request escalates to once the loop reaches a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortKind {
    /// Queue position and cursor are preserved for a future `start()`.
    Pause,
    /// The job is abandoned; not resumable.
    Stop,
}

const NONE: u8 = 0;
const PAUSE: u8 = 1;
const STOP: u8 = 2;

/// Shared abort token. Cloneable; a clone can request pause/stop while the
/// owning loop is running. Stop outranks pause and is never downgraded.
#[derive(Clone, Default)]
pub struct AbortToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: AtomicU8,
    notify: Notify,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative abort. A later `Stop` upgrades a pending
    /// `Pause`; the reverse is ignored.
    pub fn request(&self, kind: AbortKind) {
        let value = match kind {
            AbortKind::Pause => PAUSE,
            AbortKind::Stop => STOP,
        };
        self.inner.state.fetch_max(value, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// The pending request, if any. Does not clear it; the loop clears the
    /// token once the job has actually reached Paused/Stopped.
    pub fn requested(&self) -> Option<AbortKind> {
        match self.inner.state.load(Ordering::SeqCst) {
            PAUSE => Some(AbortKind::Pause),
            STOP => Some(AbortKind::Stop),
            _ => None,
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested().is_some()
    }

    /// Clear a consumed request. Called on `start()` so a resumed job does
    /// not immediately re-observe a stale abort.
    pub fn clear(&self) {
        self.inner.state.store(NONE, Ordering::SeqCst);
    }

    /// Resolves once an abort has been requested. Used in `select!` against
    /// a worker read so the abort message is forwarded promptly.
    pub async fn aborted(&self) -> AbortKind {
        loop {
            let mut notified = std::pin::pin!(self.inner.notify.notified());
            // Register for the wakeup before re-checking, so a request
            // landing in between is not lost.
            notified.as_mut().enable();
            if let Some(kind) = self.requested() {
                return kind;
            }
            notified.await;
        }
    }
}
