//! Test assertions for run artifacts and progress.

use crate::core::FinalArtifact;
use crate::progress::{CollectingProgressSink, ProgressPhase};

/// Asserts that the artifact holds outputs for exactly `stages`, in order.
///
/// # Panics
///
/// Panics if the stage names differ.
pub fn assert_stage_order(artifact: &FinalArtifact, stages: &[&str]) {
    assert_eq!(
        artifact.stage_names(),
        stages,
        "Expected stage outputs in order {stages:?}"
    );
}

/// Asserts that status-line percentages never decrease and end at `last`.
///
/// # Panics
///
/// Panics if a percentage decreases or the final one differs.
pub fn assert_progress_monotonic(sink: &CollectingProgressSink, last: u8) {
    let percentages = sink.percentages();
    assert!(
        percentages.windows(2).all(|w| w[0] <= w[1]),
        "Progress went backwards: {percentages:?}"
    );
    assert_eq!(percentages.last().copied(), Some(last), "Final percentage: {percentages:?}");
}

/// Asserts that `stage` reached `phase`.
///
/// # Panics
///
/// Panics if no such event was emitted.
pub fn assert_stage_phase(sink: &CollectingProgressSink, stage: &str, phase: ProgressPhase) {
    assert!(
        sink.position(stage, phase).is_some(),
        "Expected {stage} to emit {phase}"
    );
}
