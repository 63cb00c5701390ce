//! Template-driven stages and the standard song pipeline.

use std::sync::Arc;

use super::{template, OutputContract, Prompt, Stage};
use crate::context::PipelineContext;
use crate::core::StageKind;
use crate::errors::StageFailure;

/// A stage whose prompt is a template rendered against the context.
#[derive(Debug, Clone)]
pub struct TemplateStage {
    name: String,
    kind: StageKind,
    system: Option<String>,
    template: String,
    contract: OutputContract,
    progress: Option<String>,
}

impl TemplateStage {
    /// Creates a stage from a prompt template.
    #[must_use]
    pub fn new(name: impl Into<String>, template: impl Into<String>, contract: OutputContract) -> Self {
        Self {
            name: name.into(),
            kind: StageKind::Work,
            system: None,
            template: template.into(),
            contract,
            progress: None,
        }
    }

    /// Sets the stage kind.
    #[must_use]
    pub fn with_kind(mut self, kind: StageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets a system instruction template.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the progress message template.
    #[must_use]
    pub fn with_progress(mut self, progress: impl Into<String>) -> Self {
        self.progress = Some(progress.into());
        self
    }
}

impl Stage for TemplateStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        self.kind
    }

    fn contract(&self) -> &OutputContract {
        &self.contract
    }

    fn progress_message(&self, ctx: &PipelineContext) -> String {
        self.progress
            .as_deref()
            .and_then(|t| template::render(t, &self.name, ctx).ok())
            .unwrap_or_else(|| format!("Running {}...", self.name))
    }

    fn build_prompt(&self, ctx: &PipelineContext) -> Result<Prompt, StageFailure> {
        let text = template::render(&self.template, &self.name, ctx)?;
        let mut prompt = Prompt::new(&self.name, text).with_format(self.contract.response_format());
        if let Some(system) = &self.system {
            prompt = prompt.with_system(template::render(system, &self.name, ctx)?);
        }
        Ok(prompt)
    }
}

const SYSTEM: &str = "You are a songwriting assistant. Write in {language}.";

/// The standard five-stage song pipeline:
/// analysis, enrichment, composition, critique, formatting.
#[must_use]
pub fn song_stages() -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(
            TemplateStage::new(
                "analysis",
                "Request: {request}\nConversation so far:\n{history}\n\nSettings:\n{settings}\n\n\
                 Identify the theme, mood and style the request calls for and summarise it. \
                 Respond with a JSON object with the fields \"theme\", \"mood\", \"style\" and \"summary\".",
                OutputContract::structured(["theme", "mood", "style", "summary"]),
            )
            .with_kind(StageKind::Analysis)
            .with_system(SYSTEM)
            .with_progress("Analyzing your request..."),
        ),
        Arc::new(
            TemplateStage::new(
                "enrichment",
                "Summary: {analysis.summary}\nTheme: {theme}\nMood: {mood}\n\n\
                 Suggest imagery and vocabulary for a {style} song. Respond with a JSON object \
                 with the fields \"imagery\" and \"vocabulary\" (arrays of strings).",
                OutputContract::structured(["imagery", "vocabulary"]),
            )
            .with_kind(StageKind::Enrichment)
            .with_system(SYSTEM)
            .with_progress("Gathering imagery for a {mood} {theme} song..."),
        ),
        Arc::new(
            TemplateStage::new(
                "composition",
                "Write a {complexity} complexity {style} song about {theme} with a {mood} mood for \
                 {voice} voice using the rhyme scheme {rhyme_scheme}.\nImagery: {enrichment.imagery}\n\
                 Vocabulary: {enrichment.vocabulary}\n\n\
                 Respond with a JSON object with the fields \"title\" and \"lyrics\".",
                OutputContract::structured(["title", "lyrics"]),
            )
            .with_kind(StageKind::Composition)
            .with_system(SYSTEM)
            .with_progress("Writing the lyrics..."),
        ),
        Arc::new(
            TemplateStage::new(
                "critique",
                "Review these lyrics for rhyme scheme {rhyme_scheme}, mood and flow:\n{composition.lyrics}\n\n\
                 Respond with a JSON object with the fields \"issues\" (array of strings) and \
                 \"revised_lyrics\".",
                OutputContract::structured(["issues", "revised_lyrics"]),
            )
            .with_kind(StageKind::Critique)
            .with_system(SYSTEM)
            .with_progress("Polishing the lyrics..."),
        ),
        Arc::new(
            TemplateStage::new(
                "formatting",
                "Title: {composition.title}\nLyrics:\n{critique.revised_lyrics}\n\n\
                 Format the song with section labels (Verse, Chorus, Bridge). Return only the song.",
                OutputContract::Text,
            )
            .with_kind(StageKind::Formatting)
            .with_system(SYSTEM)
            .with_progress("Formatting the song..."),
        ),
    ]
}
