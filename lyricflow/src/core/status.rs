//! Stage kinds and the pipeline run state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Reads the request and extracts intent (theme, mood, structure hints).
    Analysis,
    /// Adds material the composition needs (imagery, references, vocabulary).
    Enrichment,
    /// Produces the main creative artifact.
    Composition,
    /// Reviews and revises an earlier stage's output.
    Critique,
    /// Shapes the result into its final presentation form.
    Formatting,
    /// Anything else.
    Work,
}

impl Default for StageKind {
    fn default() -> Self {
        Self::Work
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::Enrichment => write!(f, "enrichment"),
            Self::Composition => write!(f, "composition"),
            Self::Critique => write!(f, "critique"),
            Self::Formatting => write!(f, "formatting"),
            Self::Work => write!(f, "work"),
        }
    }
}

/// The state of one pipeline run.
///
/// `Idle -> Running(0) -> ... -> Running(n-1) -> Complete`, where any
/// running stage may move to `Failed` or `Cancelled` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PipelineState {
    /// Not started.
    Idle,
    /// Executing the stage at `index`.
    Running {
        /// Position in the stage list.
        index: usize,
        /// Stage name.
        stage: String,
    },
    /// Every stage succeeded.
    Complete,
    /// A stage failed.
    Failed {
        /// The failing stage.
        stage: String,
    },
    /// The caller cancelled the run.
    Cancelled {
        /// The stage that was running or about to run.
        stage: String,
    },
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Idle
    }
}

impl PipelineState {
    /// Returns true if the run can make no further progress.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed { .. } | Self::Cancelled { .. })
    }

    /// Returns true if `next` is a legal successor of this state.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::Idle, Self::Running { index, .. }) => *index == 0,
            (Self::Idle, Self::Cancelled { .. }) => true,
            (Self::Running { index: current, .. }, Self::Running { index: following, .. }) => {
                *following == current + 1
            }
            (
                Self::Running { .. },
                Self::Complete | Self::Failed { .. } | Self::Cancelled { .. },
            ) => true,
            _ => false,
        }
    }

    /// Moves to `next`, returning the previous state.
    ///
    /// Illegal transitions are logged and still applied; the orchestrator
    /// is the only writer and drives states in order.
    pub fn advance(&mut self, next: Self) -> Self {
        if !self.can_transition_to(&next) {
            tracing::warn!(from = %self, to = %next, "Unexpected pipeline state transition");
        }
        std::mem::replace(self, next)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running { stage, .. } => write!(f, "running({stage})"),
            Self::Complete => write!(f, "complete"),
            Self::Failed { stage } => write!(f, "failed({stage})"),
            Self::Cancelled { stage } => write!(f, "cancelled({stage})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(index: usize, stage: &str) -> PipelineState {
        PipelineState::Running {
            index,
            stage: stage.to_string(),
        }
    }

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Analysis.to_string(), "analysis");
        assert_eq!(StageKind::Formatting.to_string(), "formatting");
        assert_eq!(StageKind::default(), StageKind::Work);
    }

    #[test]
    fn test_linear_transitions() {
        let idle = PipelineState::Idle;
        assert!(idle.can_transition_to(&running(0, "a")));
        assert!(!idle.can_transition_to(&running(1, "b")));
        assert!(!idle.can_transition_to(&PipelineState::Complete));

        assert!(running(0, "a").can_transition_to(&running(1, "b")));
        assert!(!running(0, "a").can_transition_to(&running(2, "c")));
        assert!(running(2, "c").can_transition_to(&PipelineState::Complete));
    }

    #[test]
    fn test_any_stage_can_fail() {
        let failed = PipelineState::Failed {
            stage: "b".to_string(),
        };
        assert!(running(1, "b").can_transition_to(&failed));
        assert!(failed.is_terminal());
        assert!(!failed.can_transition_to(&running(2, "c")));
    }

    #[test]
    fn test_advance_returns_previous() {
        let mut state = PipelineState::Idle;
        let previous = state.advance(running(0, "a"));
        assert_eq!(previous, PipelineState::Idle);
        assert_eq!(state.to_string(), "running(a)");
    }

    #[test]
    fn test_state_serialize() {
        let json = serde_json::to_string(&PipelineState::Complete).unwrap();
        assert_eq!(json, r#"{"state":"complete"}"#);
    }
}
