//! Contracts between stages and the orchestrator.
//!
//! This module provides:
//! - Extraction of a JSON payload from free-form model text
//! - Required-field checks for structured stage outputs

mod structured;

pub use structured::{extract_json, parse, parse_value, require_fields, strip_code_fence, JsonSpan};
