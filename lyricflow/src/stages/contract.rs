//! Output contracts: what a stage's response must look like.

use serde::{Deserialize, Serialize};

use super::ResponseFormat;
use crate::contracts::{parse_value, require_fields};
use crate::core::StageOutput;
use crate::errors::OutputError;

/// The expected shape of a stage response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum OutputContract {
    /// A JSON object carrying at least the listed fields.
    Structured {
        /// Fields that must be present and non-null.
        #[serde(default)]
        required: Vec<String>,
    },
    /// Free text.
    Text,
}

impl OutputContract {
    /// A structured contract requiring `fields`.
    #[must_use]
    pub fn structured<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Structured {
            required: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the response format prompts should request.
    #[must_use]
    pub fn response_format(&self) -> ResponseFormat {
        match self {
            Self::Structured { .. } => ResponseFormat::Json,
            Self::Text => ResponseFormat::Text,
        }
    }

    /// Turns a raw response into a stage output.
    ///
    /// # Errors
    ///
    /// Returns `OutputError` if a structured response cannot be parsed or
    /// lacks a required field, or if a text response is blank.
    pub fn apply(&self, raw: &str) -> Result<StageOutput, OutputError> {
        match self {
            Self::Structured { required } => {
                let value = parse_value(raw)?;
                let fields: Vec<&str> = required.iter().map(String::as_str).collect();
                require_fields(&value, &fields)?;
                Ok(StageOutput::structured(value))
            }
            Self::Text => {
                let text = raw.trim();
                if text.is_empty() {
                    return Err(OutputError::Missing);
                }
                Ok(StageOutput::text(text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_contract_checks_fields() {
        let contract = OutputContract::structured(["theme", "mood"]);

        let output = contract
            .apply("Sure!\n```json\n{\"theme\": \"Sea\", \"mood\": \"Calm\"}\n```")
            .unwrap();
        assert_eq!(output.get_str("theme"), Some("Sea"));

        let err = contract.apply(r#"{"theme": "Sea"}"#).unwrap_err();
        assert_eq!(err, OutputError::missing_field("mood"));
    }

    #[test]
    fn test_structured_contract_reports_truncation() {
        let err = OutputContract::structured(["theme"])
            .apply(r#"{"theme": "Se"#)
            .unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn test_text_contract() {
        assert_eq!(
            OutputContract::Text.apply("  Verse 1  ").unwrap(),
            StageOutput::text("Verse 1")
        );
        assert_eq!(OutputContract::Text.apply(" \n"), Err(OutputError::Missing));
        assert_eq!(OutputContract::Text.response_format(), ResponseFormat::Text);
    }
}
