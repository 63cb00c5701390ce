//! Classification of capability errors into transient and permanent.
//!
//! A capability that reports a [`CapabilityErrorKind`] is taken at its word.
//! Messages are only inspected when no kind was supplied.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use crate::errors::{ClassifiedError, ErrorClass, PermanentKind, TransientKind};
use crate::stages::{CapabilityError, CapabilityErrorKind};

fn status_code_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([45]\d\d)\b").ok()).as_ref()
}

fn retry_after_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)(?:retry(?:ing)?\s+(?:in|after)\s+|"?retry_?delay"?\s*[:=]\s*"?)(\d+(?:\.\d+)?)\s*(ms|s)?"#,
        )
        .ok()
    })
    .as_ref()
}

fn has_status(message: &str, code: &str) -> bool {
    status_code_re().is_some_and(|re| {
        re.captures_iter(message)
            .any(|caps| caps.get(1).is_some_and(|m| m.as_str() == code))
    })
}

/// Maps a structured capability error kind to an error class.
#[must_use]
pub fn class_of(kind: CapabilityErrorKind) -> ErrorClass {
    match kind {
        CapabilityErrorKind::RateLimited => ErrorClass::Transient(TransientKind::RateLimited),
        CapabilityErrorKind::Unavailable => ErrorClass::Transient(TransientKind::Unavailable),
        CapabilityErrorKind::Auth => ErrorClass::Permanent(PermanentKind::Auth),
        CapabilityErrorKind::InvalidRequest => ErrorClass::Permanent(PermanentKind::InvalidRequest),
        CapabilityErrorKind::Other => ErrorClass::Permanent(PermanentKind::Other),
    }
}

/// Classifies an error from its message text alone.
#[must_use]
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();

    if has_status(message, "429")
        || lower.contains("resource_exhausted")
        || lower.contains("quota")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        return ErrorClass::Transient(TransientKind::RateLimited);
    }
    if has_status(message, "503") || lower.contains("unavailable") || lower.contains("overloaded") {
        return ErrorClass::Transient(TransientKind::Unavailable);
    }
    if has_status(message, "401")
        || has_status(message, "403")
        || lower.contains("api key")
        || lower.contains("unauthenticated")
        || lower.contains("permission_denied")
    {
        return ErrorClass::Permanent(PermanentKind::Auth);
    }
    if has_status(message, "400") || lower.contains("invalid_argument") {
        return ErrorClass::Permanent(PermanentKind::InvalidRequest);
    }
    ErrorClass::Permanent(PermanentKind::Other)
}

/// Extracts a server-suggested wait such as `retry in 2.5s` from a message.
#[must_use]
pub fn parse_retry_after(message: &str) -> Option<Duration> {
    let caps = retry_after_re()?.captures(message)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let seconds = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(unit) if unit == "ms" => amount / 1000.0,
        _ => amount,
    };
    Duration::try_from_secs_f64(seconds).ok()
}

/// Classifies a capability error raised by `stage`.
#[must_use]
pub fn classify(stage: &str, error: &CapabilityError) -> ClassifiedError {
    let class = error
        .kind
        .map_or_else(|| classify_message(&error.message), class_of);
    let retry_after = error
        .retry_after
        .or_else(|| parse_retry_after(&error.message));

    ClassifiedError::new(class, stage, error.message.clone()).with_retry_after(retry_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_fallback_rate_limited() {
        for message in [
            "429 Too Many Requests",
            "RESOURCE_EXHAUSTED: try later",
            "You exceeded your current quota",
            "rate limit reached",
        ] {
            assert_eq!(
                classify_message(message),
                ErrorClass::Transient(TransientKind::RateLimited),
                "{message}"
            );
        }
    }

    #[test]
    fn test_message_fallback_unavailable_auth_and_other() {
        assert_eq!(
            classify_message("503 Service Unavailable"),
            ErrorClass::Transient(TransientKind::Unavailable)
        );
        assert_eq!(
            classify_message("The model is overloaded"),
            ErrorClass::Transient(TransientKind::Unavailable)
        );
        assert_eq!(classify_message("401 Unauthorized"), ErrorClass::Permanent(PermanentKind::Auth));
        assert_eq!(
            classify_message("400 API key not valid"),
            ErrorClass::Permanent(PermanentKind::Auth)
        );
        assert_eq!(
            classify_message("400 INVALID_ARGUMENT"),
            ErrorClass::Permanent(PermanentKind::InvalidRequest)
        );
        assert_eq!(classify_message("boom"), ErrorClass::Permanent(PermanentKind::Other));
    }

    #[test]
    fn test_status_codes_match_whole_numbers_only() {
        assert_eq!(classify_message("request 14290 failed"), ErrorClass::Permanent(PermanentKind::Other));
    }

    #[test]
    fn test_structured_kind_wins_over_message() {
        let err = CapabilityError::auth("429 but actually a bad key");
        let classified = classify("analysis", &err);

        assert_eq!(classified.class, ErrorClass::Permanent(PermanentKind::Auth));
        assert_eq!(classified.stage, "analysis");
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("Please retry in 2.5s."), Some(Duration::from_millis(2500)));
        assert_eq!(parse_retry_after("Retry after 30 s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(r#""retryDelay": "7s""#), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("retry in 250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_retry_after("try again later"), None);
    }

    #[test]
    fn test_structured_retry_after_preferred() {
        let err = CapabilityError::new("429: retry in 9s").with_retry_after(Duration::from_secs(1));
        let classified = classify("critique", &err);

        assert_eq!(classified.class, ErrorClass::Transient(TransientKind::RateLimited));
        assert_eq!(classified.retry_after, Some(Duration::from_secs(1)));
    }
}
