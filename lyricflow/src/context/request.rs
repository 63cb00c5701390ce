//! The caller's run request.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::RunIdentity;
use crate::errors::ValidationError;
use crate::settings::RawSettings;

/// The language a run produces its artifact in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Language code, e.g. `en` or `pt-BR`.
    pub code: String,
    /// Display name used in prompts.
    #[serde(default)]
    pub name: String,
}

impl LanguageProfile {
    /// Creates a profile whose display name is the code itself.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            name: code.clone(),
            code,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// English.
    #[must_use]
    pub fn english() -> Self {
        Self::new("en").with_name("English")
    }

    /// Returns the name used in prompts, falling back to the code.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.code.trim()
        } else {
            self.name.trim()
        }
    }
}

impl Default for LanguageProfile {
    fn default() -> Self {
        Self::english()
    }
}

/// Who said a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The end user.
    User,
    /// A previous generation.
    Assistant,
    /// Instructions.
    System,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One turn of prior conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker.
    pub role: ChatRole,
    /// Text.
    pub content: String,
}

impl ChatMessage {
    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Credentials passed through to the capability; never logged.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Wraps an API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns true when no key was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.is_empty() { "<empty>" } else { "<redacted>" };
        f.debug_struct("Credentials").field("api_key", &shown).finish()
    }
}

/// Everything the caller supplies to start a run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    /// The free-form request, e.g. "romantic song".
    pub user_request: String,
    /// Output language.
    #[serde(default)]
    pub language: LanguageProfile,
    /// Unresolved settings from every source.
    #[serde(default)]
    pub settings: RawSettings,
    /// API credentials.
    #[serde(default)]
    pub credentials: Credentials,
    /// Prior conversation, oldest first.
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    /// Correlation IDs.
    #[serde(default)]
    pub identity: RunIdentity,
}

impl RunRequest {
    /// Creates a request in English with default settings.
    #[must_use]
    pub fn new(user_request: impl Into<String>) -> Self {
        Self {
            user_request: user_request.into(),
            ..Self::default()
        }
    }

    /// Sets the language.
    #[must_use]
    pub fn with_language(mut self, language: LanguageProfile) -> Self {
        self.language = language;
        self
    }

    /// Sets the raw settings.
    #[must_use]
    pub fn with_settings(mut self, settings: RawSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Appends a chat message.
    #[must_use]
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.chat_history.push(message);
        self
    }

    /// Sets the run identity.
    #[must_use]
    pub fn with_identity(mut self, identity: RunIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Checks the request before any external call is made.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first offending field.
    pub fn validate(&self, max_request_chars: usize) -> Result<(), ValidationError> {
        let text = self.user_request.trim();
        if text.is_empty() {
            return Err(ValidationError::new("user_request", "must not be empty"));
        }
        let length = text.chars().count();
        if length > max_request_chars {
            return Err(ValidationError::new(
                "user_request",
                format!("is {length} characters long, the maximum is {max_request_chars}"),
            ));
        }
        if self.language.code.trim().is_empty() {
            return Err(ValidationError::new("language", "language code must not be empty"));
        }
        if self.credentials.is_empty() {
            return Err(ValidationError::new("credentials", "an API key is required"));
        }
        Ok(())
    }
}
