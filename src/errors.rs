use crate::events::JobState;
use crate::types::JobId;
use std::result;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    /// The backend reported a terminal state for a job that already reached
    /// a different terminal state. Never retried, always surfaced.
    #[error("protocol violation for job {job_id:?}: terminal state {current} followed by {incoming}")]
    ProtocolViolation {
        job_id: JobId,
        current: JobState,
        incoming: JobState,
    },

    /// The status subscription died underneath us. No automatic retry;
    /// callers re-watch after an out-of-band status query.
    #[error("status subscription transport failed: {0}")]
    Transport(String),

    /// Read after an explicit close. Programming error on the caller's side.
    #[error("status stream is closed")]
    StreamClosed,

    /// The deadline passed to `await_job` elapsed. The backend job keeps
    /// running server-side.
    #[error("deadline elapsed before the job reached a terminal state")]
    DeadlineExceeded,

    /// The caller's external cancel signal fired. Distinct from
    /// `JobState::Canceled`, which is backend-driven.
    #[error("watch canceled by caller")]
    Canceled,

    /// The watcher was shut down while this watch was pending.
    #[error("watcher shut down")]
    Shutdown,

    /// Backend-reported job failure, message verbatim.
    #[error("job {job_id:?} failed: {message}")]
    JobFailed { job_id: JobId, message: String },

    /// Backend-reported job cancellation, message verbatim.
    #[error("job {job_id:?} canceled: {message}")]
    JobCanceled { job_id: JobId, message: String },
}

pub type Result<T> = result::Result<T, WatchError>;
