//! Error types for the lyricflow pipeline.
//!
//! Errors are classified at the boundary where they occur (request
//! validation, the external call, output parsing) and travel to the caller
//! unchanged, wrapped only with the name of the stage that produced them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Metadata about a pipeline construction error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-DUPLICATE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline topology is invalid.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }
}

/// Malformed or missing caller input, detected before any external call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {field}: {message}")]
pub struct ValidationError {
    /// The offending input field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a stage output is written twice.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Output conflict for stage '{stage}': output already recorded")]
pub struct OutputConflictError {
    /// The stage name.
    pub stage: String,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self { stage: stage.into() }
    }
}

/// A stage response that could not be turned into a structured payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutputError {
    /// The response contains no JSON object at all.
    #[error("Response contains no JSON object")]
    Missing,

    /// An opening brace was found but never closed.
    #[error("Response was truncated: object opened at offset {offset} is never closed")]
    Truncated {
        /// Byte offset of the opening brace.
        offset: usize,
    },

    /// Braces are balanced but the content is not valid JSON.
    #[error("Response contains malformed JSON: {reason}")]
    Malformed {
        /// The parser's description of the problem.
        reason: String,
    },

    /// The payload parsed but lacks a field the stage requires.
    #[error("Response is missing required field '{field}'")]
    MissingField {
        /// The missing field name.
        field: String,
    },
}

impl OutputError {
    /// Creates a malformed error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Creates a missing-field error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Returns true if the output was cut short.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }

    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing => "OUTPUT_MISSING",
            Self::Truncated { .. } => "OUTPUT_TRUNCATED",
            Self::Malformed { .. } => "OUTPUT_MALFORMED",
            Self::MissingField { .. } => "OUTPUT_MISSING_FIELD",
        }
    }
}

/// Retry-eligible failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientKind {
    /// Rate limit or quota signal.
    RateLimited,
    /// Service temporarily unavailable or overloaded.
    Unavailable,
}

/// Failure kinds that are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermanentKind {
    /// Authentication or authorization failure.
    Auth,
    /// The request itself was rejected.
    InvalidRequest,
    /// Anything else.
    Other,
}

/// Classification of an external call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "class", content = "kind")]
pub enum ErrorClass {
    /// May succeed if retried later.
    Transient(TransientKind),
    /// Will not succeed if retried.
    Permanent(PermanentKind),
}

impl ErrorClass {
    /// Returns true for retry-eligible classes.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns the error code used for caller guidance.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transient(TransientKind::RateLimited) => "QUOTA_EXCEEDED",
            Self::Transient(TransientKind::Unavailable) => "SERVICE_UNAVAILABLE",
            Self::Permanent(PermanentKind::Auth) => "AUTH",
            Self::Permanent(PermanentKind::InvalidRequest) => "INVALID_REQUEST",
            Self::Permanent(PermanentKind::Other) => "STAGE_FAILED",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(TransientKind::RateLimited) => write!(f, "transient/rate_limited"),
            Self::Transient(TransientKind::Unavailable) => write!(f, "transient/unavailable"),
            Self::Permanent(PermanentKind::Auth) => write!(f, "permanent/auth"),
            Self::Permanent(PermanentKind::InvalidRequest) => write!(f, "permanent/invalid_request"),
            Self::Permanent(PermanentKind::Other) => write!(f, "permanent/other"),
        }
    }
}

/// An external call failure after classification at the stage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    /// Retryable or not, and why.
    pub class: ErrorClass,
    /// Server-suggested wait before retrying, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
    /// The stage whose call failed.
    pub stage: String,
    /// The collaborator's error message.
    pub message: String,
}

impl ClassifiedError {
    /// Creates a new classified error.
    #[must_use]
    pub fn new(class: ErrorClass, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class,
            retry_after: None,
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Sets the server-suggested wait.
    #[must_use]
    pub fn with_retry_after(mut self, wait: Option<Duration>) -> Self {
        self.retry_after = wait;
        self
    }

    /// Returns true if this error may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class.is_transient()
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.class.code()));
        map.insert("class".to_string(), serde_json::json!(self.class.to_string()));
        map.insert("stage".to_string(), serde_json::json!(self.stage));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("retryable".to_string(), serde_json::json!(self.is_retryable()));
        if let Some(wait) = self.retry_after {
            #[allow(clippy::cast_possible_truncation)]
            let wait_ms = wait.as_millis() as u64;
            map.insert("retry_after_ms".to_string(), serde_json::json!(wait_ms));
        }
        map
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.class, self.message)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn exhausted_message(error: &ClassifiedError, attempts: &u32) -> String {
    match error.class {
        ErrorClass::Transient(TransientKind::RateLimited) => format!(
            "API quota exceeded for stage '{}' after {} attempts: {}",
            error.stage, attempts, error.message
        ),
        ErrorClass::Transient(TransientKind::Unavailable) => format!(
            "Service unavailable for stage '{}' after {} attempts: {}",
            error.stage, attempts, error.message
        ),
        ErrorClass::Permanent(_) => format!(
            "Stage '{}' gave up after {} attempts: {}",
            error.stage, attempts, error.message
        ),
    }
}

/// Failure of the Stage Invoker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    /// A non-retryable failure, raised on first occurrence.
    #[error("{0}")]
    Permanent(ClassifiedError),

    /// A transient failure that persisted through every retry.
    #[error("{}", exhausted_message(.error, .attempts))]
    Exhausted {
        /// The last error observed.
        error: ClassifiedError,
        /// Total number of calls made.
        attempts: u32,
    },

    /// Cancellation was requested while calling or backing off.
    #[error("Stage '{stage}' cancelled: {reason}")]
    Cancelled {
        /// The stage being invoked.
        stage: String,
        /// The cancellation reason.
        reason: String,
    },
}

impl InvokeError {
    /// Returns the classified error, if the failure came from the collaborator.
    #[must_use]
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Permanent(error) | Self::Exhausted { error, .. } => Some(error),
            Self::Cancelled { .. } => None,
        }
    }

    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Permanent(error) | Self::Exhausted { error, .. } => error.class.code(),
            Self::Cancelled { .. } => "CANCELLED",
        }
    }
}

/// Everything that can make a single stage fail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageFailure {
    /// The external call failed.
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    /// The response could not be used.
    #[error(transparent)]
    Output(#[from] OutputError),

    /// The stage could not build its prompt from the context.
    #[error("Prompt construction failed: {0}")]
    Prompt(String),
}

impl StageFailure {
    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoke(e) => e.code(),
            Self::Output(e) => e.code(),
            Self::Prompt(_) => "PROMPT",
        }
    }
}

/// The caller-facing error of a pipeline run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The run request was rejected before any external call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The pipeline topology is invalid.
    ///
    /// Produced when a [`crate::pipeline::PipelineBuilder::build`] failure is
    /// propagated with `?` from code returning `PipelineError`; a built
    /// orchestrator never returns it from `run`.
    #[error(transparent)]
    Topology(#[from] PipelineValidationError),

    /// A stage failed after its own retries were exhausted.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        /// The failing stage.
        stage: String,
        /// The stage-level error, unchanged.
        #[source]
        source: StageFailure,
    },

    /// The caller cancelled the run.
    #[error("Pipeline cancelled at stage '{stage}': {reason}")]
    Cancelled {
        /// The stage that was about to run or was running.
        stage: String,
        /// The cancellation reason.
        reason: String,
    },

    /// A stage output was recorded twice.
    #[error(transparent)]
    Context(#[from] OutputConflictError),
}

impl PipelineError {
    /// Creates a stage-attributed error.
    #[must_use]
    pub fn stage(stage: impl Into<String>, source: impl Into<StageFailure>) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: source.into(),
        }
    }

    /// Returns the name of the stage the error is attributed to.
    #[must_use]
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } | Self::Cancelled { stage, .. } => Some(stage),
            Self::Context(e) => Some(&e.stage),
            Self::Validation(_) | Self::Topology(_) => None,
        }
    }

    /// Returns the classified external-call error, if that is what failed.
    #[must_use]
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Stage {
                source: StageFailure::Invoke(e),
                ..
            } => e.classified(),
            _ => None,
        }
    }

    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Topology(_) => "PIPELINE_INVALID",
            Self::Stage { source, .. } => source.code(),
            Self::Cancelled { .. } => "CANCELLED",
            Self::Context(_) => "OUTPUT_CONFLICT",
        }
    }

    /// Returns true if the caller may reasonably try the whole run again later.
    #[must_use]
    pub fn is_retryable_later(&self) -> bool {
        self.classified().is_some_and(ClassifiedError::is_retryable)
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = self
            .classified()
            .map(ClassifiedError::to_dict)
            .unwrap_or_default();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Some(stage) = self.stage_name() {
            map.insert("stage".to_string(), serde_json::json!(stage));
        }
        if let Some(hint) = ErrorSuggestions::get(self.code()) {
            map.insert("suggestion".to_string(), serde_json::json!(hint));
        }
        map
    }
}

/// Provides caller-facing guidance for error codes.
pub struct ErrorSuggestions;

impl ErrorSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "QUOTA_EXCEEDED" => Some("API quota exceeded. Wait a while and try again later."),
            "SERVICE_UNAVAILABLE" => Some(
                "The generation service is temporarily unavailable. \
                 Check your network connection and try again.",
            ),
            "AUTH" => Some("The API key was rejected. Check your credentials."),
            "INVALID_REQUEST" => Some("The request was rejected by the service. Try rephrasing it."),
            "OUTPUT_TRUNCATED" => Some(
                "The response was cut short. Ask for a shorter or more targeted result.",
            ),
            "OUTPUT_MALFORMED" | "OUTPUT_MISSING" | "OUTPUT_MISSING_FIELD" => {
                Some("The service returned an unexpected response. Try again.")
            }
            "VALIDATION" => Some("Check the request and settings and try again."),
            _ => None,
        }
    }
}
