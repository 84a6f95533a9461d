use crate::types::JobId;
use std::fmt;

/// Lifecycle state of a backend job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Zero value; carried by heartbeat events that advance nothing.
    Unspecified,
    Queued,
    Executing,
    Success,
    Failed,
    Canceled,
}

impl JobState {
    /// Terminal states are sticky: no further transition is expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failed | JobState::Canceled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Unspecified => "unspecified",
            JobState::Queued => "queued",
            JobState::Executing => "executing",
            JobState::Success => "success",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// One status event from the backend's watch subscription. Consumed
/// read-only; `message` carries the backend's failure/cancellation text and
/// `progress` is an opaque note the watcher never parses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub message: Option<String>,
    pub progress: Option<String>,
}

impl JobStatus {
    pub fn new(job_id: JobId, state: JobState) -> Self {
        Self {
            job_id,
            state,
            message: None,
            progress: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_progress(mut self, progress: impl Into<String>) -> Self {
        self.progress = Some(progress.into());
        self
    }
}
