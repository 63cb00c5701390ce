//! Testing utilities for lyricflow pipelines.
//!
//! This module provides:
//! - A scripted capability that answers per stage and records prompts
//! - Request, config and stage fixtures
//! - Assertions for artifacts and progress

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_progress_monotonic, assert_stage_order, assert_stage_phase};
pub use fixtures::{fast_config, json_stage, test_pipeline, test_request, text_stage, TEST_API_KEY};
pub use mocks::ScriptedCapability;
pub use crate::progress::CollectingProgressSink;
