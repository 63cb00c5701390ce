//! Channel-backed progress sinks.
//!
//! [`ChannelProgressSink`] forwards events to a single consumer over an
//! unbounded mpsc channel so `emit` never blocks the run.
//! [`BroadcastProgressSink`] fans events out to any number of subscribers;
//! slow subscribers lag and lose the oldest events rather than stall the run.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};
use tracing::trace;

use super::{ProgressEvent, ProgressSink};

/// Creates a channel sink and the receiver that consumes its events.
#[must_use]
pub fn progress_channel() -> (ChannelProgressSink, mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelProgressSink::new(tx), rx)
}

/// Forwards events to an mpsc channel.
#[derive(Debug)]
pub struct ChannelProgressSink {
    sender: mpsc::UnboundedSender<ProgressEvent>,
    dropped: AtomicU64,
}

impl ChannelProgressSink {
    /// Wraps an existing sender.
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sender,
            dropped: AtomicU64::new(0),
        }
    }

    /// Returns how many events were discarded because the receiver was gone.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns true once the receiver has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("progress receiver closed, event discarded");
        }
    }
}

/// Broadcasts events to every current subscriber.
///
/// Subscribers only see events emitted after they subscribe.
#[derive(Debug)]
pub struct BroadcastProgressSink {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgressSink {
    /// Creates a broadcaster that buffers up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Adds a subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastProgressSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressSink for BroadcastProgressSink {
    fn emit(&self, event: ProgressEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ProgressLine, ProgressPhase};
    use uuid::Uuid;

    fn event(percent: u8) -> ProgressEvent {
        ProgressEvent::new(
            Uuid::new_v4(),
            Some("stage"),
            ProgressPhase::Started,
            "msg",
            percent,
            ProgressLine::Status,
        )
    }

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (sink, mut rx) = progress_channel();

        sink.emit(event(0));
        sink.emit(event(50));
        drop(sink);

        assert_eq!(rx.recv().await.map(|e| e.percent), Some(0));
        assert_eq!(rx.recv().await.map(|e| e.percent), Some(50));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_channel_counts_events_after_receiver_dropped() {
        let (sink, rx) = progress_channel();
        drop(rx);

        sink.emit(event(0));
        sink.emit(event(10));

        assert!(sink.is_closed());
        assert_eq!(sink.dropped(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let sink = BroadcastProgressSink::default();
        sink.emit(event(0));

        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);

        sink.emit(event(40));

        assert_eq!(first.recv().await.map(|e| e.percent).ok(), Some(40));
        assert_eq!(second.recv().await.map(|e| e.percent).ok(), Some(40));
    }
}
