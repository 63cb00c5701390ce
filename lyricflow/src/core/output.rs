//! Stage output type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The result of one stage.
///
/// Structured outputs hold the parsed JSON payload of the stage's contract;
/// text outputs hold the raw response of stages that produce free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum StageOutput {
    /// A parsed JSON payload.
    Structured(serde_json::Value),
    /// Opaque text.
    Text(String),
}

impl StageOutput {
    /// Creates a structured output.
    #[must_use]
    pub fn structured(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }

    /// Creates a text output.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Returns true for structured outputs.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// Returns the JSON payload of a structured output.
    #[must_use]
    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Returns the text of a text output.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Gets a top-level field of a structured output.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.as_value().and_then(|v| v.get(key))
    }

    /// Gets a top-level string field of a structured output.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(serde_json::Value::as_str)
    }

    /// Deserializes a top-level field into `T`.
    #[must_use]
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Renders the output as prompt-ready text.
    ///
    /// Structured payloads are pretty-printed JSON.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_accessors() {
        let output = StageOutput::structured(json!({"title": "Reunion", "verses": 3}));

        assert!(output.is_structured());
        assert_eq!(output.get_str("title"), Some("Reunion"));
        assert_eq!(output.field::<u32>("verses"), Some(3));
        assert_eq!(output.field::<u32>("title"), None);
        assert!(output.as_text().is_none());
    }

    #[test]
    fn test_text_accessors() {
        let output = StageOutput::text("la la la");

        assert!(!output.is_structured());
        assert_eq!(output.as_text(), Some("la la la"));
        assert!(output.get("anything").is_none());
        assert_eq!(output.render(), "la la la");
    }

    #[test]
    fn test_render_structured_is_json() {
        let output = StageOutput::structured(json!({"a": 1}));
        let rendered = output.render();
        let back: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(back, json!({"a": 1}));
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_value(StageOutput::text("x")).unwrap();
        assert_eq!(json, json!({"type": "text", "value": "x"}));
    }
}
