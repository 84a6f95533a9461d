mod actors;
pub mod errors;
mod events;
pub mod machine;
pub mod stream;
pub mod types;

// re-export the watcher handle as if it is the watcher itself.
pub use actors::watcher::{JobWatcherHandle as JobWatcher, WatchHandle};
pub use errors::WatchError;
pub use events::{JobState, JobStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ChannelSource;
    use crate::types::JobId;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn job(id: &'static str) -> JobId {
        JobId::from_static(id.as_bytes())
    }

    fn status(id: &'static str, state: JobState) -> JobStatus {
        JobStatus::new(job(id), state)
    }

    #[tokio::test]
    async fn watch_resolves_through_full_lifecycle() {
        let (publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let handle = watcher.watch(job("deal-1")).await.expect("watch");
        publisher.publish(status("deal-1", JobState::Queued));
        publisher.publish(status("deal-1", JobState::Executing));
        publisher.publish(status("deal-1", JobState::Success));

        assert_eq!(handle.resolved().await, Ok(JobState::Success));
    }

    #[tokio::test]
    async fn failure_carries_backend_message() {
        let (publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let handle = watcher.watch(job("deal-2")).await.expect("watch");
        publisher.publish(status("deal-2", JobState::Executing));
        publisher.publish(
            status("deal-2", JobState::Failed).with_message("insufficient funds"),
        );

        assert_eq!(
            handle.resolved().await,
            Err(WatchError::JobFailed {
                job_id: job("deal-2"),
                message: "insufficient funds".into(),
            })
        );
    }

    #[tokio::test]
    async fn heartbeats_do_not_advance_the_watch() {
        let (publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let handle = watcher.watch(job("deal-3")).await.expect("watch");
        publisher.publish(status("deal-3", JobState::Unspecified));
        publisher.publish(status("deal-3", JobState::Queued));
        publisher.publish(status("deal-3", JobState::Unspecified));
        publisher.publish(status("deal-3", JobState::Success));

        assert_eq!(handle.resolved().await, Ok(JobState::Success));
    }

    #[tokio::test]
    async fn concurrent_watches_resolve_exactly_once_each() {
        let (publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let first = watcher.watch(job("deal-4")).await.expect("watch");
        let second = watcher.watch(job("deal-4")).await.expect("watch");
        publisher.publish(status("deal-4", JobState::Success));

        assert_eq!(first.resolved().await, Ok(JobState::Success));
        assert_eq!(second.resolved().await, Ok(JobState::Success));
    }

    #[tokio::test]
    async fn duplicate_terminal_delivery_is_not_a_violation() {
        let (publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let first = watcher.watch(job("deal-5")).await.expect("watch");
        let second = watcher.watch(job("deal-5")).await.expect("watch");
        publisher.publish(status("deal-5", JobState::Success));
        publisher.publish(status("deal-5", JobState::Success));
        assert_eq!(first.resolved().await, Ok(JobState::Success));
        assert_eq!(second.resolved().await, Ok(JobState::Success));

        // a later watch starts from its own baseline and resolves cleanly
        let third = watcher.watch(job("deal-5")).await.expect("watch");
        publisher.publish(status("deal-5", JobState::Success));
        assert_eq!(third.resolved().await, Ok(JobState::Success));
    }

    #[tokio::test]
    async fn cancel_removes_only_one_watch() {
        let (publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let first = watcher.watch(job("deal-6")).await.expect("watch");
        let second = watcher.watch(job("deal-6")).await.expect("watch");
        // once cancel returns the registry no longer holds the watch, so no
        // resolution can race in afterwards
        first.cancel().await;

        publisher.publish(status("deal-6", JobState::Success));
        assert_eq!(second.resolved().await, Ok(JobState::Success));
    }

    #[tokio::test]
    async fn dropped_handle_does_not_wedge_other_watches() {
        let (publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let dropped = watcher.watch(job("deal-7")).await.expect("watch");
        drop(dropped);
        let live = watcher.watch(job("deal-7")).await.expect("watch");

        publisher.publish(status("deal-7", JobState::Executing));
        publisher.publish(status("deal-7", JobState::Success));
        assert_eq!(live.resolved().await, Ok(JobState::Success));
    }

    #[tokio::test]
    async fn zero_deadline_times_out_immediately() {
        let (_publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let got = watcher
            .await_job(job("deal-8"), Some(Duration::ZERO), None)
            .await;
        assert_eq!(got, Err(WatchError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn await_job_resolves_on_terminal_state() {
        let (publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let waiter = {
            let watcher = watcher.clone();
            tokio::spawn(async move {
                watcher
                    .await_job(job("deal-9"), Some(Duration::from_secs(5)), None)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        publisher.publish(status("deal-9", JobState::Queued));
        publisher.publish(status("deal-9", JobState::Success));

        assert_eq!(waiter.await.unwrap(), Ok(JobState::Success));
    }

    #[tokio::test]
    async fn external_cancel_returns_canceled() {
        let (_publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let waiter = {
            let watcher = watcher.clone();
            tokio::spawn(async move {
                watcher.await_job(job("deal-10"), None, Some(cancel_rx)).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send(()).expect("waiter gone");

        assert_eq!(waiter.await.unwrap(), Err(WatchError::Canceled));
    }

    #[tokio::test]
    async fn shutdown_rejects_every_pending_watch() {
        let (_publisher, source) = ChannelSource::single();
        let watcher = JobWatcher::spawn(source, 16);

        let a = watcher.watch(job("deal-11")).await.expect("watch");
        let b = watcher.watch(job("deal-12")).await.expect("watch");
        let c = watcher.watch(job("deal-13")).await.expect("watch");

        watcher.shutdown().await;
        assert_eq!(a.resolved().await, Err(WatchError::Shutdown));
        assert_eq!(b.resolved().await, Err(WatchError::Shutdown));
        assert_eq!(c.resolved().await, Err(WatchError::Shutdown));

        // idempotent
        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn transport_failure_rejects_all_and_rewatch_opens_a_new_segment() {
        let (publishers, source) = ChannelSource::segments(2);
        let watcher = JobWatcher::spawn(source, 16);

        let a = watcher.watch(job("deal-14")).await.expect("watch");
        let b = watcher.watch(job("deal-15")).await.expect("watch");
        publishers[0].fail("backend restart");

        assert!(matches!(a.resolved().await, Err(WatchError::Transport(_))));
        assert!(matches!(b.resolved().await, Err(WatchError::Transport(_))));

        // no automatic retry: the caller re-watches and the watcher opens a
        // fresh stream
        let again = watcher.watch(job("deal-14")).await.expect("watch");
        publishers[1].publish(status("deal-14", JobState::Success));
        assert_eq!(again.resolved().await, Ok(JobState::Success));
    }

    #[tokio::test]
    async fn watch_after_shutdown_opens_a_new_segment() {
        let (publishers, source) = ChannelSource::segments(2);
        let watcher = JobWatcher::spawn(source, 16);

        let stale = watcher.watch(job("deal-16")).await.expect("watch");
        watcher.shutdown().await;
        assert_eq!(stale.resolved().await, Err(WatchError::Shutdown));

        let fresh = watcher.watch(job("deal-16")).await.expect("watch");
        publishers[1].publish(status("deal-16", JobState::Executing));
        publishers[1].publish(status("deal-16", JobState::Success));
        assert_eq!(fresh.resolved().await, Ok(JobState::Success));
    }
}
