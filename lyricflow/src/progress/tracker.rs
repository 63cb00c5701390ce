//! Monotonic percentage tracking and event construction.

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use uuid::Uuid;

use super::{ProgressEvent, ProgressLine, ProgressPhase, ProgressSink};
use crate::core::PipelineState;

/// Maps stage positions to overall completion percentages.
///
/// Stage `i` of `n` starts at `i * 100 / n` and completes at
/// `(i + 1) * 100 / n`. Reported values never go backwards.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    current: AtomicU8,
}

impl ProgressTracker {
    /// Creates a tracker for `total` stages.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total: total.max(1),
            current: AtomicU8::new(0),
        }
    }

    /// Returns the number of stages tracked.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Percentage at which stage `index` starts.
    #[must_use]
    pub fn start_percent(&self, index: usize) -> u8 {
        self.scaled(index)
    }

    /// Percentage at which stage `index` completes.
    #[must_use]
    pub fn completed_percent(&self, index: usize) -> u8 {
        self.scaled(index + 1)
    }

    fn scaled(&self, done: usize) -> u8 {
        let percent = done.min(self.total) * 100 / self.total;
        u8::try_from(percent).unwrap_or(100)
    }

    /// Records `percent` and returns the value to report, which is never
    /// lower than anything reported before.
    pub fn advance(&self, percent: u8) -> u8 {
        let percent = percent.min(100);
        let previous = self.current.fetch_max(percent, Ordering::AcqRel);
        previous.max(percent)
    }

    /// Returns the highest percentage reported so far.
    #[must_use]
    pub fn current(&self) -> u8 {
        self.current.load(Ordering::Acquire)
    }
}

/// Emits the events of one run to a sink with consistent percentages.
///
/// Also follows the run's [`PipelineState`]: each lifecycle event moves it
/// along, so the state always matches the last event sent.
pub struct ProgressReporter<'a> {
    run_id: Uuid,
    sink: &'a dyn ProgressSink,
    tracker: ProgressTracker,
    state: Mutex<PipelineState>,
}

impl<'a> ProgressReporter<'a> {
    /// Creates a reporter for a run of `total` stages.
    #[must_use]
    pub fn new(run_id: Uuid, total: usize, sink: &'a dyn ProgressSink) -> Self {
        Self {
            run_id,
            sink,
            tracker: ProgressTracker::new(total),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    /// Returns the run id stamped on every event.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the underlying tracker.
    #[must_use]
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Returns the run's current state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state.lock().clone()
    }

    fn transition(&self, next: PipelineState) {
        self.state.lock().advance(next);
    }

    fn send(&self, stage: Option<&str>, phase: ProgressPhase, message: String, percent: u8, line: ProgressLine) {
        let percent = self.tracker.advance(percent);
        self.sink
            .emit(ProgressEvent::new(self.run_id, stage, phase, message, percent, line));
    }

    /// Stage `index` is starting.
    pub fn started(&self, index: usize, stage: &str, message: impl Into<String>) {
        self.transition(PipelineState::Running {
            index,
            stage: stage.to_string(),
        });
        let percent = self.tracker.start_percent(index);
        self.send(Some(stage), ProgressPhase::Started, message.into(), percent, ProgressLine::Status);
    }

    /// Stage `index` completed.
    pub fn completed(&self, index: usize, stage: &str, message: impl Into<String>) {
        let percent = self.tracker.completed_percent(index);
        self.send(Some(stage), ProgressPhase::Completed, message.into(), percent, ProgressLine::Status);
    }

    /// A stage is waiting before retrying its external call.
    pub fn retrying(&self, stage: &str, message: impl Into<String>) {
        let percent = self.tracker.current();
        self.send(Some(stage), ProgressPhase::Retrying, message.into(), percent, ProgressLine::Log);
    }

    /// A stage failed.
    pub fn failed(&self, stage: &str, message: impl Into<String>) {
        self.transition(PipelineState::Failed { stage: stage.to_string() });
        let percent = self.tracker.current();
        self.send(Some(stage), ProgressPhase::Failed, message.into(), percent, ProgressLine::Status);
    }

    /// The run was cancelled, optionally during a stage.
    pub fn cancelled(&self, stage: Option<&str>, message: impl Into<String>) {
        self.transition(PipelineState::Cancelled {
            stage: stage.unwrap_or_default().to_string(),
        });
        let percent = self.tracker.current();
        self.send(stage, ProgressPhase::Cancelled, message.into(), percent, ProgressLine::Status);
    }

    /// Every stage completed.
    pub fn finished(&self, message: impl Into<String>) {
        self.transition(PipelineState::Complete);
        self.send(None, ProgressPhase::Finished, message.into(), 100, ProgressLine::Status);
    }
}
