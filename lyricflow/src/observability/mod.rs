//! Observability utilities: subscriber set-up, spans and timing.

use std::time::Instant;
use tracing::{info_span, Span};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::core::StageKind;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "lyricflow=info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs a global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    match format {
        LogFormat::Compact => registry
            .with(fmt::layer().with_target(false).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    }
}

/// Span covering one pipeline run.
#[must_use]
pub fn run_span(run_id: Uuid, pipeline: &str, stages: usize) -> Span {
    info_span!("pipeline_run", run_id = %run_id, pipeline = %pipeline, stages)
}

/// Span covering one stage.
#[must_use]
pub fn stage_span(stage: &str, kind: StageKind, index: usize) -> Span {
    info_span!("stage", stage = %stage, kind = %kind, index)
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
}

impl SpanTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_fails_second_time() {
        let first = init_tracing(LogFormat::Compact);
        let second = init_tracing(LogFormat::Json);
        // Another test may have installed a subscriber first.
        assert!(first.is_err() || second.is_err());
    }

    #[test]
    fn test_spans_and_timer() {
        let _run = run_span(Uuid::new_v4(), "song", 5).entered();
        let _stage = stage_span("analysis", StageKind::Analysis, 0).entered();

        let timer = SpanTimer::start();
        assert!(timer.elapsed_ms() >= 0.0);
    }
}
