//! Sequential execution of a built pipeline.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn, Instrument};

use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::context::{PipelineContext, RunRequest};
use crate::core::{FinalArtifact, StageRecord};
use crate::errors::{InvokeError, PipelineError, StageFailure};
use crate::invoker::{RetryNotice, StageInvoker};
use crate::observability::{run_span, stage_span, SpanTimer};
use crate::progress::{BroadcastProgressSink, ProgressReporter, ProgressSink};
use crate::settings::resolve;
use crate::stages::{Capability, Stage};

/// Runs stages one at a time in declared order.
///
/// Built by [`super::PipelineBuilder`]. An orchestrator holds no per-run
/// state and can serve any number of runs.
pub struct Orchestrator {
    stages: Vec<Arc<dyn Stage>>,
    capability: Arc<dyn Capability>,
    config: PipelineConfig,
    invoker: StageInvoker,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("name", &self.config.pipeline_name)
            .field("stages", &self.stage_names())
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub(super) fn new(
        stages: Vec<Arc<dyn Stage>>,
        capability: Arc<dyn Capability>,
        config: PipelineConfig,
    ) -> Self {
        let invoker =
            StageInvoker::new(config.retry.clone()).with_call_timeout(config.stage_timeout());
        Self {
            stages,
            capability,
            config,
            invoker,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.pipeline_name
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Creates a broadcast sink sized from the configuration.
    #[must_use]
    pub fn progress_broadcast(&self) -> BroadcastProgressSink {
        BroadcastProgressSink::new(self.config.broadcast_capacity)
    }

    /// Executes the pipeline for one request.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Validation` before any external call if the
    /// request is rejected, `PipelineError::Stage` naming the first stage
    /// that failed, or `PipelineError::Cancelled` if `cancel` fires.
    pub async fn run(
        &self,
        request: RunRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<FinalArtifact, PipelineError> {
        request.validate(self.config.max_request_chars)?;

        let settings = resolve(&request.settings);
        debug!(settings = %settings.describe(), "Resolved settings");
        let ctx = PipelineContext::new(request, settings);
        let span = run_span(ctx.run_id(), self.name(), self.stages.len());

        self.drive(ctx, sink, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        mut ctx: PipelineContext,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<FinalArtifact, PipelineError> {
        let total = self.stages.len();
        let reporter = ProgressReporter::new(ctx.run_id(), total, sink);
        info!(language = %ctx.language().code, "Pipeline started");

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name();

            if cancel.is_cancelled() {
                let reason = cancel.reason_or_default();
                info!(stage = %name, reason = %reason, "Pipeline cancelled");
                reporter.cancelled(Some(name), format!("Cancelled before {name}: {reason}"));
                debug!(state = %reporter.state(), "Run stopped");
                return Err(PipelineError::Cancelled {
                    stage: name.to_string(),
                    reason,
                });
            }

            reporter.started(index, name, stage.progress_message(&ctx));

            let outcome = self
                .run_stage(stage.as_ref(), &ctx, &reporter, cancel)
                .instrument(stage_span(name, stage.kind(), index))
                .await;

            let record = match outcome {
                Ok(record) => record,
                Err(StageFailure::Invoke(InvokeError::Cancelled { reason, .. })) => {
                        info!(stage = %name, reason = %reason, "Pipeline cancelled");
                    reporter.cancelled(Some(name), format!("Cancelled during {name}: {reason}"));
                    debug!(state = %reporter.state(), "Run stopped");
                    return Err(PipelineError::Cancelled {
                        stage: name.to_string(),
                        reason,
                    });
                }
                Err(failure) => {
                    error!(stage = %name, code = failure.code(), error = %failure, "Stage failed");
                    reporter.failed(name, format!("{name} failed: {failure}"));
                    debug!(state = %reporter.state(), "Run stopped");
                    return Err(PipelineError::stage(name, failure));
                }
            };

            let attempts = record.attempts;
            let duration_ms = record.duration_ms;
            if let Err(conflict) = ctx.record(record) {
                error!(stage = %name, "Stage output already recorded");
                reporter.failed(name, conflict.to_string());
                debug!(state = %reporter.state(), "Run stopped");
                return Err(conflict.into());
            }

            info!(stage = %name, attempts, duration_ms, "Stage completed");
            reporter.completed(index, name, format!("{name} complete"));

            let delay = self.config.courtesy_delay();
            if index + 1 < total && !delay.is_zero() && cancel.sleep_or_cancel(delay).await.is_err()
            {
                debug!(stage = %name, "Courtesy delay interrupted");
            }
        }

        let artifact = ctx.into_artifact(self.name());
        info!(
            duration_ms = artifact.duration_ms,
            attempts = artifact.total_attempts(),
            "Pipeline complete"
        );
        reporter.finished(format!("{} complete", self.name()));
        debug!(state = %reporter.state(), "Run stopped");
        Ok(artifact)
    }

    async fn run_stage(
        &self,
        stage: &dyn Stage,
        ctx: &PipelineContext,
        reporter: &ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<StageRecord, StageFailure> {
        let name = stage.name();
        let timer = SpanTimer::start();
        let started_at = Utc::now();
        let observer = |notice: &RetryNotice| reporter.retrying(name, notice.describe());

        let mut prompt = stage.build_prompt(ctx)?;
        let mut attempts = 0;
        let mut recoveries = 0;

        loop {
            let capability = &self.capability;
            let credentials = ctx.credentials();
            let current = &prompt;
            let invocation = self
                .invoker
                .invoke_observed(name, cancel, Some(&observer), move || {
                    capability.generate(current, credentials)
                })
                .await?;
            attempts += invocation.attempts;

            let error = match stage.contract().apply(&invocation.value) {
                Ok(output) => {
                    return Ok(StageRecord {
                        name: name.to_string(),
                        kind: stage.kind(),
                        output,
                        attempts,
                        started_at,
                        duration_ms: timer.elapsed_ms(),
                    });
                }
                Err(error) => error,
            };

            if recoveries >= self.config.output_recovery_attempts {
                return Err(error.into());
            }
            let Some(next) = stage.recover(&error, &prompt) else {
                return Err(error.into());
            };

            recoveries += 1;
            warn!(stage = %name, code = error.code(), recoveries, "Unusable response, asking again");
            reporter.retrying(
                name,
                format!("{name} returned an unusable response ({error}). Asking again..."),
            );
            prompt = next;
        }
    }
}
