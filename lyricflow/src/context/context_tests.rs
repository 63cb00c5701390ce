//! Tests for the context module.

#[cfg(test)]
mod tests {
    use crate::context::{ChatMessage, Credentials, PipelineContext, RunIdentity, RunRequest};
    use crate::core::{StageKind, StageOutput, StageRecord};
    use crate::settings::{resolve, RawSettings};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn context() -> PipelineContext {
        let request = RunRequest::new("  romantic song  ")
            .with_credentials(Credentials::new("key"))
            .with_message(ChatMessage::user("about the sea"))
            .with_message(ChatMessage::assistant("noted"));
        PipelineContext::new(request, resolve(&RawSettings::default()))
    }

    fn record(name: &str, output: StageOutput) -> StageRecord {
        StageRecord {
            name: name.to_string(),
            kind: StageKind::Work,
            output,
            attempts: 1,
            started_at: Utc::now(),
            duration_ms: 0.5,
        }
    }

    #[test]
    fn test_request_fields_are_carried() {
        let ctx = context();

        assert_eq!(ctx.user_request(), "romantic song");
        assert_eq!(ctx.language().code, "en");
        assert_eq!(ctx.credentials().api_key(), "key");
        assert_eq!(ctx.transcript(), "user: about the sea\nassistant: noted");
        assert_eq!(ctx.settings().theme, "Love");
    }

    #[test]
    fn test_run_id_comes_from_identity() {
        let identity = RunIdentity::new();
        let run_id = identity.run_id;
        let request = RunRequest::new("x").with_identity(identity);
        let ctx = PipelineContext::new(request, resolve(&RawSettings::default()));

        assert_eq!(ctx.run_id(), run_id);
    }

    #[test]
    fn test_outputs_are_append_only() {
        let mut ctx = context();

        ctx.record(record("analysis", StageOutput::structured(serde_json::json!({"mood": "calm"}))))
            .unwrap();
        let err = ctx
            .record(record("analysis", StageOutput::text("again")))
            .unwrap_err();

        assert_eq!(err.stage, "analysis");
        assert_eq!(ctx.field("analysis", "mood"), Some(&serde_json::json!("calm")));
        assert_eq!(ctx.outputs().len(), 1);
    }

    #[test]
    fn test_outputs_keep_insertion_order() {
        let mut ctx = context();
        for name in ["c", "a", "b"] {
            ctx.record(record(name, StageOutput::text(name))).unwrap();
        }

        let names: Vec<_> = ctx.outputs().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!(ctx.outputs().last().map(|r| r.name.as_str()), Some("b"));
    }

    #[test]
    fn test_into_artifact() {
        let mut ctx = context();
        let run_id = ctx.run_id();
        ctx.record(record("draft", StageOutput::text("la la"))).unwrap();
        ctx.record(record("final", StageOutput::text("Verse 1\nla la"))).unwrap();

        let artifact = ctx.into_artifact("song");

        assert_eq!(artifact.run_id, run_id);
        assert_eq!(artifact.pipeline, "song");
        assert_eq!(artifact.request, "romantic song");
        assert_eq!(artifact.stage_names(), vec!["draft", "final"]);
        assert_eq!(artifact.body(), "Verse 1\nla la");
        assert!(artifact.duration_ms >= 0.0);
    }
}
