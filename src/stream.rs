//! The shared status stream: a lazy, possibly-infinite sequence of
//! `JobStatus` events delivered from a remote watch subscription.
//!
//! The backend multiplexes statuses for every job visible to the caller's
//! credentials; nothing here filters by job. The transport side feeds a
//! `StatusPublisher`; the watcher's pump task owns the `StatusStream` and is
//! its only reader. Close is an owned capability (`StreamCloser`) so the
//! stream can be shut from outside the reading task.

use crate::errors::{Result, WatchError};
use crate::events::JobStatus;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Clonable close capability. `close` is idempotent and safe to call while
/// a `recv` is in flight.
#[derive(Clone)]
pub struct StreamCloser {
    tx: Arc<watch::Sender<bool>>,
}

impl StreamCloser {
    pub fn close(&self) {
        debug!("closing status stream");
        let _ = self.tx.send(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.subscribe().borrow()
    }
}

/// Transport side of a status subscription.
#[derive(Clone)]
pub struct StatusPublisher {
    tx: mpsc::UnboundedSender<Result<JobStatus>>,
}

impl StatusPublisher {
    /// Deliver one status event. Returns false once the stream is gone.
    pub fn publish(&self, status: JobStatus) -> bool {
        self.tx.send(Ok(status)).is_ok()
    }

    /// Report a transport failure. The stream terminates after this; there
    /// is no auto-reconnect.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(WatchError::Transport(reason.into())));
    }
}

/// Consumer side of a status subscription.
pub struct StatusStream {
    inbox: mpsc::UnboundedReceiver<Result<JobStatus>>,
    closed_rx: watch::Receiver<bool>,
    closer: StreamCloser,
}

/// Build a connected publisher/stream pair.
pub fn status_channel() -> (StatusPublisher, StatusStream) {
    let (tx, inbox) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = watch::channel(false);
    let stream = StatusStream {
        inbox,
        closed_rx,
        closer: StreamCloser {
            tx: Arc::new(closed_tx),
        },
    };
    (StatusPublisher { tx }, stream)
}

impl StatusStream {
    /// A close capability for this stream.
    pub fn closer(&self) -> StreamCloser {
        self.closer.clone()
    }

    pub fn close(&self) {
        self.closer.close();
    }

    /// Await the next status event.
    ///
    /// Fails with `StreamClosed` after an explicit close, and with
    /// `Transport` when the publisher reports a failure or disappears.
    pub async fn recv(&mut self) -> Result<JobStatus> {
        if *self.closed_rx.borrow() {
            return Err(WatchError::StreamClosed);
        }
        tokio::select! {
            _ = self.closed_rx.changed() => Err(WatchError::StreamClosed),
            maybe = self.inbox.recv() => match maybe {
                Some(item) => item,
                None => Err(WatchError::Transport("status subscription ended".into())),
            },
        }
    }
}

/// Seam to the remote subscription endpoint. Opening is async on a real
/// transport; the credential attached to the subscription lives behind the
/// implementation.
#[async_trait]
pub trait StatusSource: Send + 'static {
    async fn open(&mut self) -> Result<StatusStream>;
}

/// In-process source backed by pre-built channel pairs, one stream per
/// watcher lifetime-segment. Doubles as the test transport.
pub struct ChannelSource {
    streams: VecDeque<StatusStream>,
}

impl ChannelSource {
    /// A source good for one lifetime-segment.
    pub fn single() -> (StatusPublisher, Self) {
        let (publisher, stream) = status_channel();
        let streams = VecDeque::from(vec![stream]);
        (publisher, Self { streams })
    }

    /// A source good for `n` lifetime-segments, with one publisher each.
    pub fn segments(n: usize) -> (Vec<StatusPublisher>, Self) {
        let mut publishers = Vec::with_capacity(n);
        let mut streams = VecDeque::with_capacity(n);
        for _ in 0..n {
            let (publisher, stream) = status_channel();
            publishers.push(publisher);
            streams.push_back(stream);
        }
        (publishers, Self { streams })
    }
}

#[async_trait]
impl StatusSource for ChannelSource {
    async fn open(&mut self) -> Result<StatusStream> {
        self.streams
            .pop_front()
            .ok_or_else(|| WatchError::Transport("status subscription endpoint unavailable".into()))
    }
}
