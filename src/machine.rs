//! Pure state machine for job lifecycle transitions.
//!
//! Terminal states are sticky. A duplicate delivery of the same terminal
//! state is a no-op; any other event after a terminal state is a protocol
//! violation. `Unspecified` events are heartbeats and advance nothing.

use crate::errors::{Result, WatchError};
use crate::events::{JobState, JobStatus};

/// Outcome of reducing one status event against a watch's last-known state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub next: JobState,
    pub is_terminal: bool,
}

/// Reduce one incoming event against the last-known state. Pure and
/// deterministic; the only error is a terminal-state contradiction.
pub fn reduce(current: JobState, event: &JobStatus) -> Result<Transition> {
    // heartbeat, no state change
    if event.state == JobState::Unspecified {
        return Ok(Transition {
            next: current,
            is_terminal: false,
        });
    }

    if current.is_terminal() {
        if event.state == current {
            // duplicate delivery of the terminal we already resolved on
            return Ok(Transition {
                next: current,
                is_terminal: false,
            });
        }
        return Err(WatchError::ProtocolViolation {
            job_id: event.job_id.clone(),
            current,
            incoming: event.state,
        });
    }

    let next = event.state;
    Ok(Transition {
        next,
        is_terminal: next.is_terminal(),
    })
}

/// Build the resolution delivered to a watch once `reduce` reports a
/// terminal transition. Failure and cancellation carry the backend's
/// message verbatim.
pub(crate) fn terminal_outcome(next: JobState, event: &JobStatus) -> Result<JobState> {
    match next {
        JobState::Failed => Err(WatchError::JobFailed {
            job_id: event.job_id.clone(),
            message: event.message.clone().unwrap_or_default(),
        }),
        JobState::Canceled => Err(WatchError::JobCanceled {
            job_id: event.job_id.clone(),
            message: event.message.clone().unwrap_or_default(),
        }),
        state => Ok(state),
    }
}
