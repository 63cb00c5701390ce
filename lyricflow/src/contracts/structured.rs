//! Structured output parsing for model responses.
//!
//! Model responses are expected to contain a single JSON object, but in
//! practice they arrive wrapped in markdown fences, surrounded by prose, or
//! cut short when the model runs out of output budget. Truncation is
//! reported separately from malformed content because the remedies differ.

use serde::de::DeserializeOwned;
use serde_json::error::Category;
use tracing::debug;

use crate::errors::OutputError;

const FENCE: &str = "```";

/// The candidate JSON object located inside a raw response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonSpan<'a> {
    /// Byte offset of the opening brace within the unfenced body.
    pub offset: usize,
    /// The text from the first `{` to the last `}` inclusive.
    pub text: &'a str,
}

/// Removes a leading and trailing markdown code fence, if present.
///
/// The opening fence may carry a language tag (```` ```json ````).
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let mut body = raw.trim();

    if let Some(rest) = body.strip_prefix(FENCE) {
        // Drop the language tag along with the fence line.
        body = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }

    if let Some(rest) = body.trim_end().strip_suffix(FENCE) {
        body = rest;
    }

    body.trim()
}

/// Locates the JSON object in a raw response.
///
/// # Errors
///
/// Returns `OutputError::Missing` if there is no `{` at all and
/// `OutputError::Truncated` if the first `{` has no `}` after it.
pub fn extract_json(raw: &str) -> Result<JsonSpan<'_>, OutputError> {
    let body = strip_code_fence(raw);

    let start = body.find('{').ok_or(OutputError::Missing)?;
    match body.rfind('}') {
        Some(end) if end > start => Ok(JsonSpan {
            offset: start,
            text: &body[start..=end],
        }),
        _ => Err(OutputError::Truncated { offset: start }),
    }
}

/// Parses a raw response into `T`.
///
/// No schema validation is done beyond what deserializing into `T` implies;
/// use [`require_fields`] for stage contracts expressed as field lists.
///
/// # Errors
///
/// Returns `OutputError::Truncated` when the object is never closed (either
/// no closing brace at all, or the parser hits end of input inside the
/// sliced object) and `OutputError::Malformed` for everything else that
/// fails to parse.
pub fn parse<T: DeserializeOwned>(raw: &str) -> Result<T, OutputError> {
    let span = extract_json(raw)?;

    serde_json::from_str(span.text).map_err(|e| {
        debug!(error = %e, offset = span.offset, "Structured output rejected");
        match e.classify() {
            Category::Eof => OutputError::Truncated {
                offset: span.offset,
            },
            Category::Io | Category::Syntax | Category::Data => OutputError::malformed(e.to_string()),
        }
    })
}

/// Parses a raw response into an untyped JSON value.
///
/// # Errors
///
/// See [`parse`].
pub fn parse_value(raw: &str) -> Result<serde_json::Value, OutputError> {
    parse(raw)
}

/// Checks that `value` is an object carrying every field in `required`.
///
/// A field that is present but `null` counts as missing.
///
/// # Errors
///
/// Returns `OutputError::Malformed` if `value` is not an object and
/// `OutputError::MissingField` naming the first absent field otherwise.
pub fn require_fields(value: &serde_json::Value, required: &[&str]) -> Result<(), OutputError> {
    let object = value
        .as_object()
        .ok_or_else(|| OutputError::malformed("expected a JSON object"))?;

    for field in required {
        match object.get(*field) {
            None | Some(serde_json::Value::Null) => {
                return Err(OutputError::missing_field(*field));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Analysis {
        theme: String,
        lines: u32,
    }

    #[test]
    fn test_unclosed_object_is_truncated() {
        let err = parse_value(r#"{"a":1"#).unwrap_err();
        assert_eq!(err, OutputError::Truncated { offset: 0 });
    }

    #[test]
    fn test_balanced_invalid_object_is_malformed() {
        let err = parse_value(r#"{"a":}"#).unwrap_err();
        assert!(matches!(err, OutputError::Malformed { .. }), "got {err:?}");
    }

    #[test]
    fn test_nested_object_cut_short_is_truncated() {
        let err = parse_value(r#"{"verses": [{"text": "first"}, {"text": "sec"#).unwrap_err();
        assert!(err.is_truncated(), "got {err:?}");
    }

    #[test]
    fn test_no_object_is_missing() {
        assert_eq!(parse_value("I cannot help with that.").unwrap_err(), OutputError::Missing);
    }

    #[test]
    fn test_closing_brace_before_opening_is_truncated() {
        let err = parse_value(r#"} then {"a": 1"#).unwrap_err();
        assert_eq!(err, OutputError::Truncated { offset: 7 });
    }

    #[test]
    fn test_strips_json_fence() {
        let raw = "```json\n{\"theme\": \"Love\", \"lines\": 12}\n```";
        let parsed: Analysis = parse(raw).unwrap();
        assert_eq!(
            parsed,
            Analysis {
                theme: "Love".to_string(),
                lines: 12
            }
        );
    }

    #[test]
    fn test_strips_bare_fence_and_surrounding_prose() {
        let raw = "Here is the analysis:\n```\n{\"theme\": \"Rain\", \"lines\": 8}\n```\nEnjoy!";
        let parsed: Analysis = parse(raw).unwrap();
        assert_eq!(parsed.theme, "Rain");
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let err = parse::<Analysis>(r#"{"theme": 3, "lines": 1}"#).unwrap_err();
        assert!(matches!(err, OutputError::Malformed { .. }));
    }

    #[test]
    fn test_strip_code_fence_single_line() {
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  plain  "), "plain");
    }

    #[test]
    fn test_extract_json_span() {
        let span = extract_json("noise {\"a\": {\"b\": 2}} trailing").unwrap();
        assert_eq!(span.offset, 6);
        assert_eq!(span.text, "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_require_fields() {
        let value = serde_json::json!({"title": "Reunion", "chorus": null});

        assert!(require_fields(&value, &["title"]).is_ok());
        assert_eq!(
            require_fields(&value, &["title", "chorus"]).unwrap_err(),
            OutputError::missing_field("chorus")
        );
        assert_eq!(
            require_fields(&value, &["verses"]).unwrap_err(),
            OutputError::missing_field("verses")
        );
        assert!(matches!(
            require_fields(&serde_json::json!([1, 2]), &["title"]).unwrap_err(),
            OutputError::Malformed { .. }
        ));
    }
}
