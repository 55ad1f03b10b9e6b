//! # HTTP Utilities
//!
//! Helpers for turning raw HTTP response bodies into JSON and for producing
//! short, log-safe previews of payloads.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Return a user-friendly hint for common HTTP failure status codes.
///
/// # Example
/// ```rust
/// use harvest_util::http::status_error_message;
///
/// let error_401 = status_error_message(401).unwrap();
/// assert!(error_401.contains("Unauthorized"));
///
/// let error_429 = status_error_message(429).unwrap();
/// assert!(error_429.contains("Too Many Requests"));
///
/// assert!(status_error_message(404).is_none());
/// ```
pub fn status_error_message(status_code: u16) -> Option<String> {
    match status_code {
        401 => Some("Unauthorized (401). Hint: check the client credentials configured in the definitions file".into()),
        403 => Some("Forbidden (403). Hint: the credentials lack permission for this endpoint".into()),
        429 => Some("Too Many Requests (429). Hint: the remote service is rate limiting this client".into()),
        _ => None,
    }
}

/// Parse HTTP response text into JSON, providing detailed errors on failure.
///
/// An empty (or whitespace-only) body is treated as `Value::Null`. Any other
/// parse failure is decorated with the originating status code and a
/// truncated preview of the body.
///
/// # Errors
/// Returns a [`JsonParseError`] describing the parse failure.
pub fn parse_response_json_strict(text: &str, status: Option<StatusCode>) -> Result<Value, JsonParseError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str::<Value>(text).map_err(|error| {
        let status_note = status
            .map(|code| format!("status {code}"))
            .unwrap_or_else(|| "unknown status".to_string());
        let preview = truncate_response_preview(text, 200);

        JsonParseError::new(status_note, error, preview)
    })
}

/// Collapse whitespace and truncate a body to roughly `limit` characters.
pub fn truncate_response_preview(text: &str, limit: usize) -> String {
    if text.trim().is_empty() {
        return "<empty>".to_string();
    }

    let mut preview = String::new();
    for ch in text.chars() {
        if preview.len() >= limit {
            preview.push_str("...");
            break;
        }
        match ch {
            '\n' | '\r' | '\t' => {
                if !preview.ends_with(' ') {
                    preview.push(' ');
                }
            }
            _ => preview.push(ch),
        }
    }

    preview.trim().to_string()
}

/// Error returned when strict JSON parsing of an HTTP response fails.
#[derive(Debug, Error)]
#[error("failed to parse JSON response ({status_note}): {source}. body preview: {body_preview}")]
pub struct JsonParseError {
    status_note: String,
    #[source]
    source: serde_json::Error,
    body_preview: String,
}

impl JsonParseError {
    pub fn new(status_note: String, source: serde_json::Error, body_preview: String) -> Self {
        Self {
            status_note,
            source,
            body_preview,
        }
    }

    /// Access the truncated response preview captured during parsing.
    pub fn body_preview(&self) -> &str {
        &self.body_preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_parses_as_null() {
        let parsed = parse_response_json_strict("  \n", Some(StatusCode::NO_CONTENT)).expect("empty body");
        assert_eq!(parsed, Value::Null);
    }

    #[test]
    fn strict_parse_reports_status_and_preview() {
        let error = parse_response_json_strict("<html>\n\tgateway timeout</html>", Some(StatusCode::OK)).expect_err("html is not json");
        let message = error.to_string();
        assert!(message.contains("status 200"), "{message}");
        assert_eq!(error.body_preview(), "<html> gateway timeout</html>");
    }

    #[test]
    fn strict_parse_accepts_objects() {
        let parsed = parse_response_json_strict(r#"{"tickets":[]}"#, None).expect("valid json");
        assert_eq!(parsed, json!({ "tickets": [] }));
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(500);
        let preview = truncate_response_preview(&body, 10);
        assert!(preview.ends_with("..."));
        assert!(preview.len() <= 13);
    }
}
