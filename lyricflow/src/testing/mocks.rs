//! A scripted stand-in for the external capability.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::context::Credentials;
use crate::stages::{Capability, CapabilityError, Prompt};

type Reply = Result<String, CapabilityError>;

/// A capability that answers from per-stage scripts and records every call.
///
/// Each stage has a queue of replies consumed in order. When a stage's
/// queue is empty the fallback reply is used; without a fallback the call
/// fails with an `Other` error naming the stage.
#[derive(Debug, Default)]
pub struct ScriptedCapability {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallbacks: Mutex<HashMap<String, Reply>>,
    prompts: Mutex<Vec<Prompt>>,
    latency: Option<Duration>,
}

impl ScriptedCapability {
    /// Creates a capability with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a capability with a valid reply for every standard song stage.
    #[must_use]
    pub fn song() -> Self {
        Self::new()
            .always(
                "analysis",
                r#"{"theme": "Reunion", "mood": "Nostalgic", "style": "Folk", "summary": "Two old friends meet again"}"#,
            )
            .always(
                "enrichment",
                r#"{"imagery": ["porch light", "old photographs"], "vocabulary": ["homecoming", "faded"]}"#,
            )
            .always(
                "composition",
                r#"{"title": "Porch Light", "lyrics": "The porch light still remembers you"}"#,
            )
            .always(
                "critique",
                r#"{"issues": [], "revised_lyrics": "The porch light still remembers you, friend"}"#,
            )
            .always(
                "formatting",
                "Porch Light\n\nThe porch light still remembers you, friend",
            )
    }

    /// Queues a successful reply for `stage`.
    #[must_use]
    pub fn reply(self, stage: &str, text: impl Into<String>) -> Self {
        self.push(stage, Ok(text.into()));
        self
    }

    /// Queues a failure for `stage`.
    #[must_use]
    pub fn fail(self, stage: &str, error: CapabilityError) -> Self {
        self.push(stage, Err(error));
        self
    }

    /// Sets the reply used once `stage`'s queue is empty.
    #[must_use]
    pub fn always(self, stage: &str, text: impl Into<String>) -> Self {
        self.fallbacks.lock().insert(stage.to_string(), Ok(text.into()));
        self
    }

    /// Sets the failure returned once `stage`'s queue is empty.
    #[must_use]
    pub fn always_fail(self, stage: &str, error: CapabilityError) -> Self {
        self.fallbacks.lock().insert(stage.to_string(), Err(error));
        self
    }

    /// Delays every reply by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn push(&self, stage: &str, reply: Reply) {
        self.scripts
            .lock()
            .entry(stage.to_string())
            .or_default()
            .push_back(reply);
    }

    fn next_reply(&self, stage: &str) -> Reply {
        if let Some(reply) = self.scripts.lock().get_mut(stage).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.fallbacks
            .lock()
            .get(stage)
            .cloned()
            .unwrap_or_else(|| Err(CapabilityError::new(format!("no scripted reply for '{stage}'"))))
    }

    /// Returns every prompt received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().clone()
    }

    /// Returns the prompts received for `stage`.
    #[must_use]
    pub fn prompts_for(&self, stage: &str) -> Vec<Prompt> {
        self.prompts
            .lock()
            .iter()
            .filter(|p| p.stage == stage)
            .cloned()
            .collect()
    }

    /// Returns the total number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Returns the number of calls made for `stage`.
    #[must_use]
    pub fn calls_for(&self, stage: &str) -> usize {
        self.prompts.lock().iter().filter(|p| p.stage == stage).count()
    }

    /// Returns the distinct stages called, in first-call order.
    #[must_use]
    pub fn call_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for prompt in self.prompts.lock().iter() {
            if order.last() != Some(&prompt.stage) {
                order.push(prompt.stage.clone());
            }
        }
        order
    }
}

#[async_trait]
impl Capability for ScriptedCapability {
    async fn generate(&self, prompt: &Prompt, _credentials: &Credentials) -> Result<String, CapabilityError> {
        self.prompts.lock().push(prompt.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_reply(&prompt.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let capability = ScriptedCapability::new()
            .fail("a", CapabilityError::rate_limited("429"))
            .reply("a", "first")
            .always("a", "again");
        let credentials = Credentials::new("key");
        let prompt = Prompt::new("a", "go");

        assert!(capability.generate(&prompt, &credentials).await.is_err());
        assert_eq!(capability.generate(&prompt, &credentials).await.unwrap(), "first");
        assert_eq!(capability.generate(&prompt, &credentials).await.unwrap(), "again");
        assert_eq!(capability.calls_for("a"), 3);
    }

    #[tokio::test]
    async fn test_unscripted_stage_fails() {
        let capability = ScriptedCapability::new();
        let err = capability
            .generate(&Prompt::new("missing", "go"), &Credentials::new("key"))
            .await
            .unwrap_err();
        assert!(err.message.contains("missing"));
    }
}
