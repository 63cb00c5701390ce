//! Context management for pipeline execution.
//!
//! This module provides:
//! - The caller's run request (text, language, settings, credentials, history)
//! - Run identity for correlation
//! - The per-run pipeline context with its append-only output store

mod bags;
#[cfg(test)]
mod context_tests;
mod execution;
mod identity;
mod request;

pub use bags::OutputBag;
pub use execution::PipelineContext;
pub use identity::RunIdentity;
pub use request::{ChatMessage, ChatRole, Credentials, LanguageProfile, RunRequest};
