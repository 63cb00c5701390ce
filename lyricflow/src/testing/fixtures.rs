//! Test fixtures for pipeline testing.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::context::{Credentials, PipelineContext, RunRequest};
use crate::errors::PipelineValidationError;
use crate::invoker::RetryPolicy;
use crate::pipeline::{Orchestrator, PipelineBuilder};
use crate::stages::{Capability, FnStage, OutputContract, Prompt, Stage};

/// API key stamped on test requests.
pub const TEST_API_KEY: &str = "test-key";

/// A valid request with test credentials.
#[must_use]
pub fn test_request(text: &str) -> RunRequest {
    RunRequest::new(text).with_credentials(Credentials::new(TEST_API_KEY))
}

/// Configuration with short retry delays and no courtesy delay.
#[must_use]
pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_courtesy_delay_ms(0)
        .with_retry(
            RetryPolicy::new()
                .with_initial_delay_ms(10)
                .with_suggested_wait_buffer_ms(10),
        )
}

/// A structured stage whose response must carry `fields`.
#[must_use]
pub fn json_stage(name: &'static str, fields: &[&str]) -> Arc<dyn Stage> {
    Arc::new(FnStage::new(
        name,
        OutputContract::structured(fields.iter().copied()),
        move |ctx: &PipelineContext| Ok(Prompt::new(name, format!("{name}: {}", ctx.user_request()))),
    ))
}

/// A free-text stage.
#[must_use]
pub fn text_stage(name: &'static str) -> Arc<dyn Stage> {
    Arc::new(FnStage::new(name, OutputContract::Text, move |ctx: &PipelineContext| {
        Ok(Prompt::new(name, format!("{name}: {}", ctx.user_request())))
    }))
}

/// Builds an orchestrator over `stages` with [`fast_config`].
///
/// # Errors
///
/// Returns the builder's validation error.
pub fn test_pipeline(
    stages: Vec<Arc<dyn Stage>>,
    capability: Arc<dyn Capability>,
) -> Result<Orchestrator, PipelineValidationError> {
    PipelineBuilder::new()
        .with_config(fast_config())
        .with_name("test")
        .with_capability(capability)
        .stages(stages)?
        .build()
}
