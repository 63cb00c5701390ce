//! The external generation capability seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::context::Credentials;

/// What shape of response a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// A JSON object.
    Json,
    /// Free text.
    #[default]
    Text,
}

/// A fully built request for the external capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// The stage that built the prompt.
    pub stage: String,
    /// System-level instructions, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// The prompt body.
    pub text: String,
    /// Expected response shape.
    #[serde(default)]
    pub format: ResponseFormat,
}

impl Prompt {
    /// Creates a text prompt for `stage`.
    #[must_use]
    pub fn new(stage: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            system: None,
            text: text.into(),
            format: ResponseFormat::Text,
        }
    }

    /// Sets the system instructions.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the expected response format.
    #[must_use]
    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    /// Appends a paragraph to the prompt body.
    #[must_use]
    pub fn with_followup(mut self, followup: impl AsRef<str>) -> Self {
        self.text.push_str("\n\n");
        self.text.push_str(followup.as_ref());
        self
    }
}

/// Failure kinds a capability can report without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityErrorKind {
    /// Rate limit or quota exhausted.
    RateLimited,
    /// Service unavailable or overloaded.
    Unavailable,
    /// Credentials rejected.
    Auth,
    /// The request was rejected as invalid.
    InvalidRequest,
    /// Anything else.
    Other,
}

impl fmt::Display for CapabilityErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Auth => write!(f, "auth"),
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// An error returned by a [`Capability`].
///
/// `kind` is authoritative when set. Without it the invoker falls back to
/// inspecting `message`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CapabilityError {
    /// Structured failure kind, if the capability knows it.
    pub kind: Option<CapabilityErrorKind>,
    /// The error message.
    pub message: String,
    /// Server-suggested wait before retrying.
    pub retry_after: Option<Duration>,
    /// Underlying transport error.
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl CapabilityError {
    /// Creates an unclassified error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
            retry_after: None,
            source: None,
        }
    }

    /// Creates an error with a known kind.
    #[must_use]
    pub fn with_kind(kind: CapabilityErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            ..Self::new(message)
        }
    }

    /// A rate-limit error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::with_kind(CapabilityErrorKind::RateLimited, message)
    }

    /// A service-unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_kind(CapabilityErrorKind::Unavailable, message)
    }

    /// An authentication error.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::with_kind(CapabilityErrorKind::Auth, message)
    }

    /// Sets the server-suggested wait.
    #[must_use]
    pub fn with_retry_after(mut self, wait: Duration) -> Self {
        self.retry_after = Some(wait);
        self
    }

    /// Attaches the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        let boxed: Box<dyn std::error::Error + Send + Sync> = source.into();
        self.source = Some(Arc::from(boxed));
        self
    }
}

impl From<anyhow::Error> for CapabilityError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(format!("{error:#}")).with_source(error)
    }
}

/// The external generation service a stage calls.
///
/// Implementations wrap an LLM client. They receive the prompt and the
/// caller's credentials and return the raw response text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Capability: Send + Sync {
    /// Generates a response for `prompt`.
    async fn generate(
        &self,
        prompt: &Prompt,
        credentials: &Credentials,
    ) -> Result<String, CapabilityError>;
}

#[async_trait]
impl<T: Capability + ?Sized> Capability for Arc<T> {
    async fn generate(
        &self,
        prompt: &Prompt,
        credentials: &Credentials,
    ) -> Result<String, CapabilityError> {
        (**self).generate(prompt, credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_prompt_builder() {
        let prompt = Prompt::new("analysis", "Analyse the request")
            .with_system("You are a songwriter")
            .with_format(ResponseFormat::Json)
            .with_followup("Respond with JSON only.");

        assert_eq!(prompt.text, "Analyse the request\n\nRespond with JSON only.");
        assert_eq!(prompt.system.as_deref(), Some("You are a songwriter"));
        assert_eq!(prompt.format, ResponseFormat::Json);
    }

    #[test]
    fn test_error_from_anyhow_keeps_source() {
        let err = CapabilityError::from(anyhow::anyhow!("connection reset"));

        assert!(err.kind.is_none());
        assert_eq!(err.to_string(), "connection reset");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_kind_constructors() {
        let err = CapabilityError::rate_limited("slow down").with_retry_after(Duration::from_secs(2));
        assert_eq!(err.kind, Some(CapabilityErrorKind::RateLimited));
        assert_eq!(err.retry_after, Some(Duration::from_secs(2)));
        assert_eq!(CapabilityError::auth("no").kind, Some(CapabilityErrorKind::Auth));
    }
}
