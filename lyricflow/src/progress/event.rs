//! Progress event type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Distinguishes status lines (replace the current status) from log lines
/// (append to a running log).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressLine {
    /// A headline status update.
    Status,
    /// A detail line for a log view.
    Log,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    /// A stage is about to run.
    Started,
    /// A stage is waiting to retry its external call.
    Retrying,
    /// A stage's output was stored.
    Completed,
    /// A stage failed; the run is over.
    Failed,
    /// The run was cancelled.
    Cancelled,
    /// Every stage completed.
    Finished,
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Retrying => write!(f, "retrying"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// A single progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run the event belongs to.
    pub run_id: Uuid,
    /// The stage the event concerns; `None` for run-level events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// What happened.
    pub phase: ProgressPhase,
    /// Human-readable message.
    pub message: String,
    /// Overall completion, 0 to 100, never decreasing within a run.
    pub percent: u8,
    /// Status or log line.
    pub line: ProgressLine,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        stage: Option<&str>,
        phase: ProgressPhase,
        message: impl Into<String>,
        percent: u8,
        line: ProgressLine,
    ) -> Self {
        Self {
            run_id,
            stage: stage.map(str::to_string),
            phase,
            message: message.into(),
            percent: percent.min(100),
            line,
            timestamp: Utc::now(),
        }
    }

    /// Returns true for status lines.
    #[must_use]
    pub fn is_status(&self) -> bool {
        self.line == ProgressLine::Status
    }

    /// Returns true if this event concerns `stage` in `phase`.
    #[must_use]
    pub fn is(&self, stage: &str, phase: ProgressPhase) -> bool {
        self.phase == phase && self.stage.as_deref() == Some(stage)
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stage {
            Some(stage) => write!(f, "[{:>3}%] {} {}: {}", self.percent, stage, self.phase, self.message),
            None => write!(f, "[{:>3}%] {}: {}", self.percent, self.phase, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_capped() {
        let event = ProgressEvent::new(
            Uuid::new_v4(),
            None,
            ProgressPhase::Finished,
            "done",
            250,
            ProgressLine::Status,
        );
        assert_eq!(event.percent, 100);
    }

    #[test]
    fn test_is_matches_stage_and_phase() {
        let event = ProgressEvent::new(
            Uuid::new_v4(),
            Some("analysis"),
            ProgressPhase::Completed,
            "Analysis done",
            20,
            ProgressLine::Status,
        );

        assert!(event.is("analysis", ProgressPhase::Completed));
        assert!(!event.is("analysis", ProgressPhase::Started));
        assert!(event.is_status());
        assert_eq!(event.to_string(), "[ 20%] analysis completed: Analysis done");
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::new(
            Uuid::new_v4(),
            Some("critique"),
            ProgressPhase::Retrying,
            "waiting",
            60,
            ProgressLine::Log,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["phase"], "retrying");
        assert_eq!(json["line"], "log");

        let back: ProgressEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
