mod actor;
mod messages;

use self::actor::JobWatcher;
use self::messages::{
    JobOutcome,
    WatcherMessage::{self, Cancel, Shutdown, Watch},
};
use crate::errors::{Result, WatchError};
use crate::events::JobState;
use crate::stream::StatusSource;
use crate::types::{HandleId, JobId};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A `JobWatcher` which multiplexes a shared status stream into per-job
/// completion signals.
///
/// This struct is actually an actor handle, the real work is done in the
/// actor spawned by `JobWatcherHandle::spawn`. The actor owns the watch
/// registry outright, so registry mutation and event dispatch are serialized
/// by construction without an `Arc<Mutex>`.
#[derive(Clone)]
pub struct JobWatcherHandle {
    sender: mpsc::Sender<WatcherMessage>,
}

impl JobWatcherHandle {
    /// Spawn a new watcher over the given subscription source.
    ///
    /// Specify the capacity for the watcher's message queue. This limits the
    /// build-up of inbound messages.
    pub fn spawn(source: impl StatusSource, message_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(message_capacity);
        JobWatcher::spawn(receiver, Box::new(source));
        Self { sender }
    }

    /// Subscribe to one job's lifecycle. Opens the shared status stream
    /// lazily on the first watch of a lifetime-segment.
    pub async fn watch(&self, job_id: JobId) -> Result<WatchHandle> {
        let (tx, rx) = oneshot::channel();
        let msg = Watch {
            job_id: job_id.clone(),
            response: tx,
        };
        self.sender.send(msg).await.expect("JobWatcher exited");
        let (id, outcome) = rx.await.expect("JobWatcher exited")?;
        Ok(WatchHandle {
            job_id,
            id,
            outcome,
            watcher: self.sender.clone(),
        })
    }

    /// Block the caller until `job_id` reaches a terminal state, the
    /// deadline elapses, or the external cancel signal fires.
    ///
    /// Deadline expiry and caller cancellation tear down the watch only;
    /// the backend job keeps running server-side. A dropped cancel sender
    /// never fires.
    pub async fn await_job(
        &self,
        job_id: JobId,
        deadline: Option<Duration>,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> Result<JobState> {
        enum Wake {
            Resolved(JobOutcome),
            Gone,
            Deadline,
            Canceled,
        }

        let mut handle = self.watch(job_id).await?;
        let wake = {
            let deadline = expire(deadline);
            let canceled = fired(cancel);
            tokio::pin!(deadline, canceled);
            tokio::select! {
                res = &mut handle.outcome => match res {
                    Ok(outcome) => Wake::Resolved(outcome),
                    Err(_) => Wake::Gone,
                },
                _ = &mut deadline => Wake::Deadline,
                _ = &mut canceled => Wake::Canceled,
            }
        };
        match wake {
            Wake::Resolved(outcome) => outcome,
            Wake::Gone => Err(WatchError::Shutdown),
            Wake::Deadline => {
                handle.cancel().await;
                Err(WatchError::DeadlineExceeded)
            }
            Wake::Canceled => {
                handle.cancel().await;
                Err(WatchError::Canceled)
            }
        }
    }

    /// Close the shared stream and reject every pending watch. Idempotent;
    /// a later `watch` starts a fresh lifetime-segment.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Shutdown { response: tx })
            .await
            .expect("JobWatcher exited");
        rx.await.expect("JobWatcher exited")
    }
}

/// One caller's subscription to a job's lifecycle. Exactly one terminal
/// resolution is delivered, unless the handle is cancelled first.
pub struct WatchHandle {
    job_id: JobId,
    id: HandleId,
    outcome: oneshot::Receiver<JobOutcome>,
    watcher: mpsc::Sender<WatcherMessage>,
}

impl WatchHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Await this watch's terminal resolution.
    pub async fn resolved(self) -> Result<JobState> {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => Err(WatchError::Shutdown),
        }
    }

    /// Remove this watch from the registry. Other watches on the same job
    /// and the shared stream are unaffected. Once `cancel` returns, no
    /// resolution will be delivered, even for events already in flight.
    pub async fn cancel(self) {
        let (tx, rx) = oneshot::channel();
        let msg = Cancel {
            job_id: self.job_id,
            handle_id: self.id,
            response: tx,
        };
        if self.watcher.send(msg).await.is_ok() {
            // ack arrives only after the registry mutation
            let _ = rx.await;
        }
    }
}

/// Resolves when the optional deadline elapses; never, without one.
async fn expire(deadline: Option<Duration>) {
    match deadline {
        Some(limit) => tokio::time::sleep(limit).await,
        None => futures::future::pending().await,
    }
}

/// Resolves when the optional cancel signal fires. Dropping the sender is
/// not a cancellation.
async fn fired(cancel: Option<oneshot::Receiver<()>>) {
    if let Some(rx) = cancel {
        if rx.await.is_ok() {
            return;
        }
    }
    futures::future::pending().await
}
