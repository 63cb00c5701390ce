//! The composite result of a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StageKind, StageOutput};
use crate::settings::ResolvedSettings;

/// One stage's stored result, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name.
    pub name: String,
    /// Stage kind.
    pub kind: StageKind,
    /// The stage output.
    pub output: StageOutput,
    /// Number of external calls the stage made, including retries and re-asks.
    pub attempts: u32,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

/// The final artifact assembled from every stage's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalArtifact {
    /// The pipeline run ID.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// The caller's original request.
    pub request: String,
    /// The language the artifact was produced in.
    pub language: String,
    /// Settings the run was executed with.
    pub settings: ResolvedSettings,
    /// Stage results in execution order.
    pub stages: Vec<StageRecord>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total run duration in milliseconds.
    pub duration_ms: f64,
}

impl FinalArtifact {
    /// Returns the output of the named stage.
    #[must_use]
    pub fn output(&self, stage: &str) -> Option<&StageOutput> {
        self.stages
            .iter()
            .find(|r| r.name == stage)
            .map(|r| &r.output)
    }

    /// Returns the output of the last stage, which is the artifact body.
    #[must_use]
    pub fn final_output(&self) -> Option<&StageOutput> {
        self.stages.last().map(|r| &r.output)
    }

    /// Renders the artifact body as text.
    #[must_use]
    pub fn body(&self) -> String {
        self.final_output().map(StageOutput::render).unwrap_or_default()
    }

    /// Returns stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|r| r.name.as_str()).collect()
    }

    /// Total external calls across all stages.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.stages.iter().map(|r| r.attempts).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{resolve, RawSettings};

    fn record(name: &str, output: StageOutput, attempts: u32) -> StageRecord {
        StageRecord {
            name: name.to_string(),
            kind: StageKind::Work,
            output,
            attempts,
            started_at: Utc::now(),
            duration_ms: 1.0,
        }
    }

    fn artifact(stages: Vec<StageRecord>) -> FinalArtifact {
        FinalArtifact {
            run_id: Uuid::new_v4(),
            pipeline: "song".to_string(),
            request: "romantic song".to_string(),
            language: "en".to_string(),
            settings: resolve(&RawSettings::default()),
            stages,
            started_at: Utc::now(),
            duration_ms: 2.0,
        }
    }

    #[test]
    fn test_final_output_is_last_stage() {
        let artifact = artifact(vec![
            record("analysis", StageOutput::structured(serde_json::json!({"mood": "calm"})), 1),
            record("formatting", StageOutput::text("Verse 1"), 2),
        ]);

        assert_eq!(artifact.body(), "Verse 1");
        assert_eq!(artifact.output("analysis").and_then(|o| o.get_str("mood")), Some("calm"));
        assert_eq!(artifact.stage_names(), vec!["analysis", "formatting"]);
        assert_eq!(artifact.total_attempts(), 3);
    }

    #[test]
    fn test_empty_artifact_body() {
        assert_eq!(artifact(Vec::new()).body(), "");
    }
}
