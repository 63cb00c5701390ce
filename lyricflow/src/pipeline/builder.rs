//! Pipeline builder with validation.

use std::collections::HashSet;
use std::sync::Arc;

use super::Orchestrator;
use crate::config::PipelineConfig;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::stages::{song_stages, Capability, Stage};

/// Builder for creating validated pipelines.
#[derive(Clone, Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
    names: HashSet<String>,
    name: Option<String>,
    config: PipelineConfig,
    capability: Option<Arc<dyn Capability>>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name())
            .field("stages", &self.stage_names())
            .field("has_capability", &self.capability.is_some())
            .finish()
    }
}

impl PipelineBuilder {
    /// Creates a new pipeline builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder preloaded with the standard song stages.
    #[must_use]
    pub fn song() -> Self {
        let mut builder = Self::new();
        for stage in song_stages() {
            builder.names.insert(stage.name().to_string());
            builder.stages.push(stage);
        }
        builder
    }

    /// Sets the pipeline name.
    ///
    /// Takes precedence over the configuration's `pipeline_name`, whichever
    /// is set first.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the name the pipeline will be built with.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.config.pipeline_name)
    }

    /// Sets the runtime configuration.
    ///
    /// A name given with [`PipelineBuilder::with_name`] is kept.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the external capability every stage calls.
    #[must_use]
    pub fn with_capability(mut self, capability: Arc<dyn Capability>) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Appends a stage. Stages run in the order they are added.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is unnamed or its name is already taken.
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Result<Self, PipelineValidationError> {
        let name = stage.name().to_string();

        if name.trim().is_empty() {
            return Err(PipelineValidationError::new("Stage name must not be empty")
                .with_error_info(
                    ContractErrorInfo::new("PIPELINE-UNNAMED", "A stage has an empty name")
                        .with_fix_hint("Give every stage a unique, non-empty name."),
                ));
        }

        if !self.names.insert(name.clone()) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{name}' is defined more than once"
            ))
            .with_stages(vec![name.clone()])
            .with_error_info(
                ContractErrorInfo::new("PIPELINE-DUPLICATE", format!("Duplicate stage '{name}'"))
                    .with_fix_hint("Rename one of the stages; outputs are stored by stage name.")
                    .with_context_entry("stage", name),
            ));
        }

        self.stages.push(stage);
        Ok(self)
    }

    /// Appends several stages in order.
    ///
    /// # Errors
    ///
    /// Returns the first validation error.
    pub fn stages<I>(self, stages: I) -> Result<Self, PipelineValidationError>
    where
        I: IntoIterator<Item = Arc<dyn Stage>>,
    {
        stages.into_iter().try_fold(self, Self::stage)
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no stages, no capability, or the
    /// configuration is invalid.
    pub fn build(mut self) -> Result<Orchestrator, PipelineValidationError> {
        if let Some(name) = self.name.take() {
            self.config.pipeline_name = name;
        }

        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("PIPELINE-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        }

        let Some(capability) = self.capability else {
            return Err(PipelineValidationError::new("Pipeline has no capability")
                .with_error_info(
                    ContractErrorInfo::new(
                        "PIPELINE-NO-CAPABILITY",
                        "Stages have nothing to call",
                    )
                    .with_fix_hint("Call with_capability() with the generation client."),
                ));
        };

        if let Err(e) = self.config.validate() {
            return Err(PipelineValidationError::new(e.to_string()).with_error_info(
                ContractErrorInfo::new("PIPELINE-CONFIG", "Invalid pipeline configuration")
                    .with_fix_hint("Correct the configuration value named in the message."),
            ));
        }

        Ok(Orchestrator::new(self.stages, capability, self.config))
    }
}
