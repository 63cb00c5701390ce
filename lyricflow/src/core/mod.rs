//! Core domain model types for lyricflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage kinds and the pipeline run state machine
//! - Stage outputs
//! - Per-stage records and the final artifact

mod artifact;
mod output;
mod status;

pub use artifact::{FinalArtifact, StageRecord};
pub use output::StageOutput;
pub use status::{PipelineState, StageKind};
