//! Error taxonomy for job execution.
//!
//! Job-fatal failures (resolution, transfer) set the job's Error state and
//! stop automatic processing; per-payload transcode failures are logged and
//! the queue advances. Cooperative abort is not an error and is represented
//! by [`crate::control::JobAborted`] instead.

use thiserror::Error;

/// Classified failure of a job or one of its units.
#[derive(Debug, Error)]
pub enum JobError {
    /// The resource-list endpoint returned an empty or malformed body.
    /// Fatal for the job; not retried automatically.
    #[error("cannot resolve resource list: {0}")]
    Resolve(String),

    /// A sub-download failed or its response was aborted by the remote end.
    /// Fatal for the job; in-memory archive state is discarded.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The worker reported a failure for one payload. The queue still
    /// advances past it.
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// A message crossing the process boundary matched none of the
    /// enumerated protocol shapes.
    #[error("invalid worker message: {0}")]
    Protocol(String),

    /// The worker process exited while a request was outstanding.
    #[error("worker process exited unexpectedly")]
    WorkerGone,
}
