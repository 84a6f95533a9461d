use crate::errors::Result;
use crate::events::JobState;
use crate::types::{HandleId, JobId};
use tokio::sync::oneshot;

/// Terminal resolution delivered to a watch: the terminal state on success,
/// or an error carrying the backend's message, a transport failure, or a
/// shutdown notice.
pub type JobOutcome = Result<JobState>;

#[derive(Debug)]
pub enum WatcherMessage {
    Watch {
        job_id: JobId,
        response: oneshot::Sender<Result<(HandleId, oneshot::Receiver<JobOutcome>)>>,
    },
    Cancel {
        job_id: JobId,
        handle_id: HandleId,
        response: oneshot::Sender<()>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}
