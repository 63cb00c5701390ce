//! The per-run pipeline context.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ChatMessage, Credentials, LanguageProfile, OutputBag, RunIdentity, RunRequest};
use crate::core::{FinalArtifact, StageOutput, StageRecord};
use crate::errors::OutputConflictError;
use crate::settings::ResolvedSettings;

/// State carried through a pipeline run.
///
/// The request fields and resolved settings are fixed at construction.
/// Stage outputs are append-only.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    identity: RunIdentity,
    user_request: String,
    language: LanguageProfile,
    settings: ResolvedSettings,
    chat_history: Vec<ChatMessage>,
    credentials: Credentials,
    outputs: OutputBag,
    started_at: DateTime<Utc>,
}

impl PipelineContext {
    /// Creates a context from a request and its resolved settings.
    #[must_use]
    pub fn new(request: RunRequest, settings: ResolvedSettings) -> Self {
        Self {
            identity: request.identity,
            user_request: request.user_request.trim().to_string(),
            language: request.language,
            settings,
            chat_history: request.chat_history,
            credentials: request.credentials,
            outputs: OutputBag::new(),
            started_at: Utc::now(),
        }
    }

    /// Returns the run ID.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.identity.run_id
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the caller's original request, trimmed.
    #[must_use]
    pub fn user_request(&self) -> &str {
        &self.user_request
    }

    /// Returns the output language.
    #[must_use]
    pub fn language(&self) -> &LanguageProfile {
        &self.language
    }

    /// Returns the resolved settings.
    #[must_use]
    pub fn settings(&self) -> &ResolvedSettings {
        &self.settings
    }

    /// Returns prior conversation, oldest first.
    #[must_use]
    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    /// Renders the chat history as `role: content` lines.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.chat_history
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns the credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns when the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the output store.
    #[must_use]
    pub fn outputs(&self) -> &OutputBag {
        &self.outputs
    }

    /// Returns the output of a prior stage.
    #[must_use]
    pub fn output(&self, stage: &str) -> Option<&StageOutput> {
        self.outputs.get(stage)
    }

    /// Returns a field of a prior stage's structured output.
    #[must_use]
    pub fn field(&self, stage: &str, key: &str) -> Option<&serde_json::Value> {
        self.output(stage).and_then(|o| o.get(key))
    }

    /// Stores a stage's result.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflictError` if the stage already stored an output.
    pub fn record(&mut self, record: StageRecord) -> Result<(), OutputConflictError> {
        self.outputs.insert(record)
    }

    /// Assembles the final artifact from everything recorded.
    #[must_use]
    pub fn into_artifact(self, pipeline: impl Into<String>) -> FinalArtifact {
        #[allow(clippy::cast_precision_loss)]
        let duration_ms = (Utc::now() - self.started_at)
            .num_microseconds()
            .map_or(0.0, |us| us as f64 / 1000.0);

        FinalArtifact {
            run_id: self.identity.run_id,
            pipeline: pipeline.into(),
            request: self.user_request,
            language: self.language.code,
            settings: self.settings,
            stages: self.outputs.into_records(),
            started_at: self.started_at,
            duration_ms,
        }
    }
}
