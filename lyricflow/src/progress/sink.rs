//! Progress sink trait and implementations.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, Level};

use super::{ProgressEvent, ProgressLine, ProgressPhase};

/// Receives progress events from a pipeline run.
///
/// `emit` is called synchronously by the orchestrator and must not block;
/// implementations suppress their own failures.
pub trait ProgressSink: Send + Sync {
    /// Delivers one event.
    fn emit(&self, event: ProgressEvent);
}

impl<T: ProgressSink + ?Sized> ProgressSink for Arc<T> {
    fn emit(&self, event: ProgressEvent) {
        (**self).emit(event);
    }
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// A sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingProgressSink {
    level: Level,
}

impl Default for LoggingProgressSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingProgressSink {
    /// Creates a new logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl ProgressSink for LoggingProgressSink {
    fn emit(&self, event: ProgressEvent) {
        let stage = event.stage.as_deref().unwrap_or("-");
        // Log lines are detail; keep them out of info-level output.
        if self.level == Level::DEBUG || event.line == ProgressLine::Log {
            debug!(
                run_id = %event.run_id,
                stage = %stage,
                phase = %event.phase,
                percent = event.percent,
                "{}", event.message
            );
        } else {
            info!(
                run_id = %event.run_id,
                stage = %stage,
                phase = %event.phase,
                percent = event.percent,
                "{}", event.message
            );
        }
    }
}

/// A sink that forwards each event to a closure.
pub struct CallbackProgressSink<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackProgressSink<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    /// Creates a new callback sink.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> fmt::Debug for CallbackProgressSink<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackProgressSink").finish_non_exhaustive()
    }
}

impl<F> ProgressSink for CallbackProgressSink<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        (self.callback)(&event);
    }
}

/// A sink that delivers every event to several sinks in order.
#[derive(Default)]
pub struct FanoutProgressSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanoutProgressSink {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Returns the number of sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if there are no sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ProgressSink for FanoutProgressSink {
    fn emit(&self, event: ProgressEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    events: parking_lot::RwLock<Vec<ProgressEvent>>,
}

impl CollectingProgressSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns events in the given phase.
    #[must_use]
    pub fn events_in_phase(&self, phase: ProgressPhase) -> Vec<ProgressEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.phase == phase)
            .cloned()
            .collect()
    }

    /// Returns the position of the first event for `stage` in `phase`.
    #[must_use]
    pub fn position(&self, stage: &str, phase: ProgressPhase) -> Option<usize> {
        self.events.read().iter().position(|e| e.is(stage, phase))
    }

    /// Returns the percentages of status lines, in emission order.
    #[must_use]
    pub fn percentages(&self) -> Vec<u8> {
        self.events
            .read()
            .iter()
            .filter(|e| e.is_status())
            .map(|e| e.percent)
            .collect()
    }
}

impl ProgressSink for CollectingProgressSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn event(stage: &str, phase: ProgressPhase, percent: u8) -> ProgressEvent {
        ProgressEvent::new(Uuid::new_v4(), Some(stage), phase, "msg", percent, ProgressLine::Status)
    }

    #[test]
    fn test_noop_and_logging_sinks_accept_events() {
        NoOpProgressSink.emit(event("a", ProgressPhase::Started, 0));
        LoggingProgressSink::default().emit(event("a", ProgressPhase::Completed, 50));
        LoggingProgressSink::debug().emit(event("a", ProgressPhase::Failed, 50));
    }

    #[test]
    fn test_callback_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let sink = CallbackProgressSink::new(move |e: &ProgressEvent| {
            assert_eq!(e.stage.as_deref(), Some("a"));
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        sink.emit(event("a", ProgressPhase::Started, 0));
        sink.emit(event("a", ProgressPhase::Completed, 100));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fanout_delivers_to_every_sink() {
        let first = Arc::new(CollectingProgressSink::new());
        let second = Arc::new(CollectingProgressSink::new());
        let fanout = FanoutProgressSink::new()
            .with(first.clone())
            .with(second.clone());

        fanout.emit(event("a", ProgressPhase::Started, 0));

        assert_eq!(fanout.len(), 2);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        FanoutProgressSink::new().emit(event("a", ProgressPhase::Started, 0));
    }

    #[test]
    fn test_collecting_sink_queries() {
        let sink = CollectingProgressSink::new();
        assert!(sink.is_empty());

        sink.emit(event("a", ProgressPhase::Started, 0));
        sink.emit(event("a", ProgressPhase::Completed, 50));
        sink.emit(event("b", ProgressPhase::Started, 50));

        assert_eq!(sink.events_in_phase(ProgressPhase::Started).len(), 2);
        assert_eq!(sink.position("b", ProgressPhase::Started), Some(2));
        assert_eq!(sink.position("c", ProgressPhase::Started), None);
        assert_eq!(sink.percentages(), vec![0, 50, 50]);
    }
}
