//! Stage trait and implementations.
//!
//! A stage is a stateless definition: it builds a prompt from the pipeline
//! context, declares what shape of response it expects, and may offer a
//! follow-up prompt when the response cannot be used. The orchestrator does
//! the calling, parsing and storing.

mod capability;
mod contract;
pub mod template;
mod topology;

pub use capability::{Capability, CapabilityError, CapabilityErrorKind, Prompt, ResponseFormat};
#[cfg(test)]
pub use capability::MockCapability;
pub use contract::OutputContract;
pub use topology::{song_stages, TemplateStage};

use std::fmt::Debug;

use crate::context::PipelineContext;
use crate::core::StageKind;
use crate::errors::{OutputError, StageFailure};

/// Trait for pipeline stages.
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage. Names are unique within a pipeline.
    fn name(&self) -> &str;

    /// Returns the kind of work the stage does.
    fn kind(&self) -> StageKind {
        StageKind::Work
    }

    /// Returns the expected response shape.
    fn contract(&self) -> &OutputContract;

    /// Returns the status line shown while the stage runs.
    fn progress_message(&self, _ctx: &PipelineContext) -> String {
        format!("Running {}...", self.name())
    }

    /// Builds the prompt for this stage from the context.
    ///
    /// # Errors
    ///
    /// Returns `StageFailure::Prompt` if the context lacks what the prompt needs.
    fn build_prompt(&self, ctx: &PipelineContext) -> Result<Prompt, StageFailure>;

    /// Offers a follow-up prompt after an unusable response.
    ///
    /// Returning `None` fails the stage with `error`.
    fn recover(&self, error: &OutputError, prompt: &Prompt) -> Option<Prompt> {
        Some(prompt.clone().with_followup(recovery_instruction(error)))
    }
}

/// The follow-up appended to a prompt after an unusable response.
#[must_use]
pub fn recovery_instruction(error: &OutputError) -> String {
    match error {
        OutputError::Truncated { .. } => "Your previous response was cut off before the JSON \
             object was closed. Respond again with a shorter, complete JSON object only."
            .to_string(),
        OutputError::MissingField { field } => format!(
            "Your previous response did not include the required field \"{field}\". \
             Respond again with a complete JSON object that includes it."
        ),
        OutputError::Missing | OutputError::Malformed { .. } => {
            "Your previous response was not valid JSON. Respond again with a single valid \
             JSON object and nothing else."
                .to_string()
        }
    }
}

/// A closure-backed stage.
pub struct FnStage<F>
where
    F: Fn(&PipelineContext) -> Result<Prompt, StageFailure> + Send + Sync,
{
    name: String,
    kind: StageKind,
    contract: OutputContract,
    message: Option<String>,
    build: F,
}

impl<F> FnStage<F>
where
    F: Fn(&PipelineContext) -> Result<Prompt, StageFailure> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, contract: OutputContract, build: F) -> Self {
        Self {
            name: name.into(),
            kind: StageKind::Work,
            contract,
            message: None,
            build,
        }
    }

    /// Sets the stage kind.
    #[must_use]
    pub fn with_kind(mut self, kind: StageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets a fixed progress message.
    #[must_use]
    pub fn with_progress_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&PipelineContext) -> Result<Prompt, StageFailure> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&PipelineContext) -> Result<Prompt, StageFailure> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        self.kind
    }

    fn contract(&self) -> &OutputContract {
        &self.contract
    }

    fn progress_message(&self, _ctx: &PipelineContext) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("Running {}...", self.name))
    }

    fn build_prompt(&self, ctx: &PipelineContext) -> Result<Prompt, StageFailure> {
        let prompt = (self.build)(ctx)?;
        Ok(prompt.with_format(self.contract.response_format()))
    }
}
