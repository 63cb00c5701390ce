//! Pipeline building and execution.
//!
//! This module provides:
//! - A builder that validates stage lists
//! - The orchestrator that runs stages strictly in order

mod builder;
mod orchestrator;

pub use builder::PipelineBuilder;
pub use orchestrator::Orchestrator;
