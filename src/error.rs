//! Error types for image generation.

use std::time::Duration;

/// Maximum length of an API error body carried in an error message.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Errors that can occur while generating images.
#[derive(Debug, thiserror::Error)]
pub enum GraftError {
    /// Configuration file missing, unreadable, or incomplete.
    #[error("configuration error: {0}")]
    Config(String),

    /// Neither a prompt nor an input image was supplied.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// API key rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Account has no credits or billing is not set up.
    #[error("billing error: {0}")]
    Billing(String),

    /// Rate limit exceeded. Reported, never retried.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The model answered but produced no images.
    #[error("no images returned{}", model_said(.content))]
    NoImages { content: Option<String> },

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (reading input, saving output).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraftError {
    /// Process exit code for this error.
    ///
    /// Usage-class errors exit with 2, everything else with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingInput(_) | Self::InvalidRequest(_) => 2,
            _ => 1,
        }
    }
}

fn model_said(content: &Option<String>) -> String {
    match content {
        Some(text) => format!("; model said: {text}"),
        None => String::new(),
    }
}

/// Result type alias for graft operations.
pub type Result<T> = std::result::Result<T, GraftError>;

/// Parses a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Redacts bearer tokens and OpenRouter keys, then truncates.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let joined = redact_keys(text);
    let trimmed = joined.trim();

    if trimmed.chars().count() > MAX_ERROR_BODY_LEN {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Replaces `sk-` keys wherever they start a token, including inside
/// quoted JSON values and `key=value` pairs.
fn redact_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("sk-") {
        let (before, candidate) = rest.split_at(pos);
        out.push_str(before);

        let at_boundary = !out.chars().last().is_some_and(is_key_char);
        let len = candidate
            .find(|c: char| !is_key_char(c))
            .unwrap_or(candidate.len());
        let token = &candidate[..len];
        if at_boundary && (token.starts_with("sk-or-") || token.len() > 20) {
            out.push_str("[REDACTED]");
        } else {
            out.push_str(token);
        }
        rest = &candidate[len..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(GraftError::MissingInput("no prompt".into()).exit_code(), 2);
        assert_eq!(GraftError::InvalidRequest("bad".into()).exit_code(), 2);
        assert_eq!(GraftError::Config("missing".into()).exit_code(), 1);
        assert_eq!(GraftError::NoImages { content: None }.exit_code(), 1);
        assert_eq!(
            GraftError::Api {
                status: 500,
                message: "boom".into()
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_error_display() {
        let err = GraftError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = GraftError::NoImages { content: None };
        assert_eq!(err.to_string(), "no images returned");

        let err = GraftError::NoImages {
            content: Some("I can only describe images".into()),
        };
        assert_eq!(
            err.to_string(),
            "no images returned; model said: I can only describe images"
        );
    }

    #[test]
    fn test_sanitize_redacts_keys() {
        let msg = sanitize_error_message("invalid key sk-or-v1-abcdef0123456789 provided");
        assert_eq!(msg, "invalid key [REDACTED] provided");
        assert!(!msg.contains("abcdef"));
    }

    #[test]
    fn test_sanitize_redacts_keys_inside_json() {
        let body = r#"{"error":{"message":"bad key","key":"sk-or-v1-abcdef0123456789"}}"#;
        let msg = sanitize_error_message(body);
        assert!(!msg.contains("abcdef"));
        assert!(msg.contains(r#""key":"[REDACTED]""#));

        let msg = sanitize_error_message("api_key=sk-proj-0123456789abcdefghij, retry");
        assert_eq!(msg, "api_key=[REDACTED], retry");
    }

    #[test]
    fn test_sanitize_keeps_ordinary_words() {
        assert_eq!(sanitize_error_message("task-sk-1 failed"), "task-sk-1 failed");
        assert_eq!(sanitize_error_message("see sk-short"), "see sk-short");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(2 * MAX_ERROR_BODY_LEN);
        let msg = sanitize_error_message(&long);
        assert_eq!(msg.len(), MAX_ERROR_BODY_LEN + 3);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(30));
    }
}
