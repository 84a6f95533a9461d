use super::messages::{JobOutcome, WatcherMessage};
use crate::errors::{Result, WatchError};
use crate::events::{JobState, JobStatus};
use crate::machine;
use crate::stream::{StatusSource, StatusStream, StreamCloser};
use crate::types::{HandleId, JobId};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// One registered watch. Each tracks its own last-known state: watches
/// registered at different times start from different baselines but converge
/// on the same sticky terminal outcome.
struct PendingWatch {
    id: HandleId,
    last: JobState,
    outcome_tx: oneshot::Sender<JobOutcome>,
}

/// Raw stream event forwarded by the pump: a status, or the transport
/// failure that ended the segment.
type StreamEvent = Result<JobStatus>;

pub struct JobWatcher {
    inbox: mpsc::Receiver<WatcherMessage>,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    source: Box<dyn StatusSource>,
    closer: Option<StreamCloser>,
    registry: HashMap<JobId, Vec<PendingWatch>>,
}

impl JobWatcher {
    pub fn spawn(inbox: mpsc::Receiver<WatcherMessage>, source: Box<dyn StatusSource>) {
        // placeholder receiver; replaced when the first watch opens a stream
        let (_, events) = mpsc::unbounded_channel();
        let actor = Self {
            inbox,
            events,
            source,
            closer: None,
            registry: HashMap::new(),
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                maybe_msg = self.inbox.recv() => match maybe_msg {
                    Some(msg) => self.handle_message(msg).await,
                    None => {
                        // every handle dropped; tear down the stream and exit
                        if let Some(closer) = self.closer.take() {
                            closer.close();
                        }
                        return;
                    }
                },
                Some(event) = self.events.recv() => match event {
                    Ok(status) => self.on_status(status),
                    Err(err) => self.on_transport_failure(err),
                },
            }
        }
    }

    async fn handle_message(&mut self, msg: WatcherMessage) {
        use WatcherMessage::*;
        match msg {
            Watch { job_id, response } => {
                let res = self.register(job_id).await;
                let _ = response.send(res);
            }
            Cancel {
                job_id,
                handle_id,
                response,
            } => {
                self.cancel(job_id, handle_id);
                let _ = response.send(());
            }
            Shutdown { response } => {
                self.shutdown();
                let _ = response.send(());
            }
        }
    }

    /// Register a watch, lazily opening the shared stream for this
    /// lifetime-segment and starting its pump.
    async fn register(
        &mut self,
        job_id: JobId,
    ) -> Result<(HandleId, oneshot::Receiver<JobOutcome>)> {
        if self.closer.is_none() {
            let stream = self.source.open().await?;
            debug!("opened shared status stream");
            self.closer = Some(stream.closer());
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            // dropping the previous receiver strands any stale events from
            // an earlier segment
            self.events = events_rx;
            tokio::spawn(pump(stream, events_tx));
        }
        let id = HandleId::new_v4();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        self.registry.entry(job_id).or_default().push(PendingWatch {
            id,
            last: JobState::Unspecified,
            outcome_tx,
        });
        Ok((id, outcome_rx))
    }

    /// Fan one status event out to every pending watch on its job, each
    /// reduced against its own baseline. Terminal watches resolve exactly
    /// once and leave the registry.
    fn on_status(&mut self, status: JobStatus) {
        let pending = match self.registry.remove(&status.job_id) {
            Some(pending) => pending,
            None => return,
        };
        let mut remaining = Vec::with_capacity(pending.len());
        for mut watch in pending {
            match machine::reduce(watch.last, &status) {
                Err(err) => {
                    warn!(job_id = ?status.job_id, %err, "protocol violation from backend");
                    let _ = watch.outcome_tx.send(Err(err));
                }
                Ok(step) => {
                    watch.last = step.next;
                    if step.is_terminal {
                        let _ = watch
                            .outcome_tx
                            .send(machine::terminal_outcome(step.next, &status));
                    } else if !watch.outcome_tx.is_closed() {
                        // only retain watches whose callers have not dropped
                        remaining.push(watch);
                    }
                }
            }
        }
        if !remaining.is_empty() {
            self.registry.insert(status.job_id, remaining);
        }
    }

    /// The segment is over: reject every pending watch across all jobs and
    /// leave reopening to the next `watch` call. No automatic retry.
    fn on_transport_failure(&mut self, err: WatchError) {
        warn!(%err, "status stream transport failed");
        self.closer = None;
        self.reject_all(err);
    }

    fn cancel(&mut self, job_id: JobId, handle_id: HandleId) {
        if let Some(pending) = self.registry.get_mut(&job_id) {
            pending.retain(|watch| watch.id != handle_id);
            if pending.is_empty() {
                self.registry.remove(&job_id);
            }
        }
        // the shared stream stays open; other jobs may still be watched
    }

    fn shutdown(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer.close();
        }
        self.reject_all(WatchError::Shutdown);
    }

    fn reject_all(&mut self, err: WatchError) {
        for (_, pending) in self.registry.drain() {
            for watch in pending {
                let _ = watch.outcome_tx.send(Err(err.clone()));
            }
        }
    }
}

/// Dispatch pump: sole owner and reader of the open stream. Forwards events
/// in order until the stream closes or the transport dies.
async fn pump(mut stream: StatusStream, events: mpsc::UnboundedSender<StreamEvent>) {
    loop {
        match stream.recv().await {
            Ok(status) => {
                if events.send(Ok(status)).is_err() {
                    return;
                }
            }
            Err(WatchError::StreamClosed) => return,
            Err(err) => {
                let _ = events.send(Err(err));
                return;
            }
        }
    }
}
