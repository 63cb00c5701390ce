//! Placeholder rendering for prompt and progress templates.
//!
//! Placeholders are `{name}` where `name` is one of:
//!
//! - `request`, `language`, `language_code`, `history`
//! - a settings key such as `theme` or `rhyme_scheme`
//! - `output.<stage>` for a prior stage's rendered output
//! - `<stage>.<field>` for one field of a prior stage's structured output
//! - `stage` for the stage being rendered
//!
//! `{{` and `}}` produce literal braces.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::context::PipelineContext;
use crate::errors::StageFailure;
use crate::settings::SettingField;

fn placeholder() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{|\}\}|\{([a-z_][a-z0-9_]*(?:\.[a-z0-9_\-]+)?)\}").ok())
        .as_ref()
}

fn lookup(name: &str, stage: &str, ctx: &PipelineContext) -> Option<String> {
    match name {
        "stage" => return Some(stage.to_string()),
        "request" => return Some(ctx.user_request().to_string()),
        "language" => return Some(ctx.language().display_name().to_string()),
        "language_code" => return Some(ctx.language().code.clone()),
        "history" => return Some(ctx.transcript()),
        "settings" => return Some(ctx.settings().describe()),
        _ => {}
    }

    if let Some((head, tail)) = name.split_once('.') {
        if head == "output" {
            return ctx.output(tail).map(crate::core::StageOutput::render);
        }
        return ctx.field(head, tail).map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }

    name.parse::<SettingField>()
        .ok()
        .map(|field| ctx.settings().get(field).to_string())
}

/// Renders `template` against the context.
///
/// # Errors
///
/// Returns `StageFailure::Prompt` naming the first placeholder that cannot
/// be resolved.
pub fn render(template: &str, stage: &str, ctx: &PipelineContext) -> Result<String, StageFailure> {
    let Some(re) = placeholder() else {
        return Ok(template.to_string());
    };

    let mut missing: Option<String> = None;
    let rendered = re.replace_all(template, |caps: &Captures<'_>| {
        match caps.get(0).map(|m| m.as_str()) {
            Some("{{") => return "{".to_string(),
            Some("}}") => return "}".to_string(),
            _ => {}
        }
        let name = caps.get(1).map_or("", |m| m.as_str());
        lookup(name, stage, ctx).unwrap_or_else(|| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(StageFailure::Prompt(format!(
            "unresolved placeholder '{{{name}}}' in template for stage '{stage}'"
        ))),
        None => Ok(rendered.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Credentials, RunRequest};
    use crate::core::{StageKind, StageOutput, StageRecord};
    use crate::settings::{resolve, ExplicitSettings, RawSettings};
    use chrono::Utc;

    fn context() -> PipelineContext {
        let raw = RawSettings::new()
            .with_explicit(ExplicitSettings::new().with(SettingField::Mood, "Nostalgic"));
        let request = RunRequest::new("summer song").with_credentials(Credentials::new("k"));
        let mut ctx = PipelineContext::new(request, resolve(&raw));
        ctx.record(StageRecord {
            name: "analysis".to_string(),
            kind: StageKind::Analysis,
            output: StageOutput::structured(serde_json::json!({"theme": "Beach", "lines": 4})),
            attempts: 1,
            started_at: Utc::now(),
            duration_ms: 1.0,
        })
        .unwrap();
        ctx
    }

    #[test]
    fn test_renders_request_settings_and_outputs() {
        let rendered = render(
            "Write a {mood} {style} piece about {request} ({analysis.theme}, {analysis.lines} lines) in {language}.",
            "composition",
            &context(),
        )
        .unwrap();

        assert_eq!(
            rendered,
            "Write a Nostalgic Pop piece about summer song (Beach, 4 lines) in English."
        );
    }

    #[test]
    fn test_renders_whole_output_and_escapes() {
        let rendered = render("{stage}: {{\"x\": 1}} {output.analysis}", "critique", &context()).unwrap();

        assert!(rendered.starts_with("critique: {\"x\": 1} {"));
        assert!(rendered.contains("\"theme\": \"Beach\""));
    }

    #[test]
    fn test_unknown_placeholder_fails() {
        let err = render("Use {tempo} and {missing.field}", "composition", &context()).unwrap_err();

        assert_eq!(err.code(), "PROMPT");
        assert!(err.to_string().contains("{tempo}"));
    }
}
