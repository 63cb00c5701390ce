//! Retry policy and the stage invoker.
//!
//! Transient failures are retried with exponential backoff, or after the
//! server-suggested wait plus a buffer when the error carries one. Permanent
//! failures are raised on first occurrence. Every wait can be cut short by
//! the run's cancellation token.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::classify;
use crate::cancellation::CancellationToken;
use crate::errors::{ClassifiedError, InvokeError};
use crate::stages::CapabilityError;

/// Jitter applied to computed backoff delays.
///
/// Server-suggested waits are never jittered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    2000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_suggested_wait_buffer_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

/// How a stage's external call is retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first call; the call is made at most `max_retries + 1` times.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Multiplier applied per retry.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Added to a server-suggested wait, in milliseconds.
    #[serde(default = "default_suggested_wait_buffer_ms")]
    pub suggested_wait_buffer_ms: u64,
    /// Cap on computed backoff delays in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter for computed delays.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            suggested_wait_buffer_ms: default_suggested_wait_buffer_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_max_retries(0)
    }

    /// Sets the number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay_ms(mut self, delay: u64) -> Self {
        self.initial_delay_ms = delay;
        self
    }

    /// Sets the backoff factor.
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Sets the buffer added to server-suggested waits.
    #[must_use]
    pub fn with_suggested_wait_buffer_ms(mut self, buffer: u64) -> Self {
        self.suggested_wait_buffer_ms = buffer;
        self
    }

    /// Sets the maximum computed delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the wait before retry number `retry` (0-indexed).
    ///
    /// A suggested wait is honoured as given plus the buffer, saturating
    /// rather than overflowing, and is not capped at the maximum. Otherwise
    /// the delay is `initial * factor^retry`, capped at the maximum.
    #[must_use]
    pub fn delay_for(&self, retry: u32, suggested: Option<Duration>) -> Duration {
        if let Some(wait) = suggested {
            return wait.saturating_add(Duration::from_millis(self.suggested_wait_buffer_ms));
        }

        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let raw = self.initial_delay_ms as f64 * self.backoff_factor.max(0.0).powi(exponent);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = if raw.is_finite() {
            (raw.round() as u64).min(self.max_delay_ms)
        } else {
            self.max_delay_ms
        };

        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Details of an upcoming retry, passed to a retry observer.
#[derive(Debug, Clone)]
pub struct RetryNotice {
    /// The stage being retried.
    pub stage: String,
    /// Calls made so far.
    pub attempt: u32,
    /// Retries left after this one.
    pub remaining: u32,
    /// How long the invoker will wait.
    pub delay: Duration,
    /// The failure that triggered the retry.
    pub error: ClassifiedError,
}

impl RetryNotice {
    /// Renders the notice as a progress log line.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{} is busy ({}). Retrying in {:.1}s ({} retries left)...",
            self.stage,
            self.error.class,
            self.delay.as_secs_f64(),
            self.remaining
        )
    }
}

/// A successful invocation and the number of calls it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<R> {
    /// The result.
    pub value: R,
    /// Calls made, including the successful one.
    pub attempts: u32,
}

enum CallError {
    Failed(CapabilityError),
    Cancelled(String),
}

/// Calls a stage's external capability under a retry policy.
#[derive(Debug, Clone, Default)]
pub struct StageInvoker {
    policy: RetryPolicy,
    call_timeout: Option<Duration>,
}

impl StageInvoker {
    /// Creates an invoker with the given policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            call_timeout: None,
        }
    }

    /// Bounds each call attempt; an elapsed timeout counts as the service
    /// being unavailable.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invokes `op` for `stage`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns `InvokeError::Permanent` on the first non-retryable failure,
    /// `InvokeError::Exhausted` once retries run out, and
    /// `InvokeError::Cancelled` if `cancel` fires first.
    pub async fn invoke<R, F, Fut>(
        &self,
        stage: &str,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<R, InvokeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, CapabilityError>>,
    {
        self.invoke_observed(stage, cancel, None, op)
            .await
            .map(|invocation| invocation.value)
    }

    /// Like [`StageInvoker::invoke`], reporting each retry to `observer` and
    /// returning the number of calls made.
    ///
    /// # Errors
    ///
    /// See [`StageInvoker::invoke`].
    pub async fn invoke_observed<R, F, Fut>(
        &self,
        stage: &str,
        cancel: &CancellationToken,
        observer: Option<&(dyn Fn(&RetryNotice) + Send + Sync)>,
        mut op: F,
    ) -> Result<Invocation<R>, InvokeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, CapabilityError>>,
    {
        let cancelled = |reason: String| InvokeError::Cancelled {
            stage: stage.to_string(),
            reason,
        };
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(cancel.reason_or_default()));
            }
            attempt += 1;

            let error = match self.call_once(&mut op, cancel).await {
                Ok(value) => {
                    debug!(stage = %stage, attempt, "Stage call succeeded");
                    return Ok(Invocation { value, attempts: attempt });
                }
                Err(CallError::Cancelled(reason)) => return Err(cancelled(reason)),
                Err(CallError::Failed(error)) => classify(stage, &error),
            };

            if !error.is_retryable() {
                return Err(InvokeError::Permanent(error));
            }

            let retries_used = attempt - 1;
            if retries_used >= self.policy.max_retries {
                return Err(InvokeError::Exhausted {
                    error,
                    attempts: attempt,
                });
            }

            let delay = self.policy.delay_for(retries_used, error.retry_after);
            let remaining = self.policy.max_retries - attempt;
            #[allow(clippy::cast_possible_truncation)]
            let delay_ms = delay.as_millis() as u64;
            warn!(
                stage = %stage,
                attempt,
                remaining,
                delay_ms,
                error = %error,
                "Transient failure, retrying"
            );

            if let Some(observer) = observer {
                observer(&RetryNotice {
                    stage: stage.to_string(),
                    attempt,
                    remaining,
                    delay,
                    error,
                });
            }

            cancel.sleep_or_cancel(delay).await.map_err(cancelled)?;
        }
    }

    async fn call_once<R, F, Fut>(&self, op: &mut F, cancel: &CancellationToken) -> Result<R, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, CapabilityError>>,
    {
        let timeout = self.call_timeout;
        let call = async move {
            let fut = op();
            match timeout {
                Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                    Err(CapabilityError::unavailable(format!(
                        "call timed out after {}ms",
                        limit.as_millis()
                    )))
                }),
                None => fut.await,
            }
        };

        tokio::select! {
            result = call => result.map_err(CallError::Failed),
            () = cancel.cancelled() => Err(CallError::Cancelled(cancel.reason_or_default())),
        }
    }
}
