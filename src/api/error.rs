use serde::Deserialize;
use thiserror::Error;

/// Maximum length for error response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Fallback shown when the server provides no usable message
const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Message fragments that mark a refresh failure as an authentication
/// failure (as opposed to a transient network problem).
const AUTH_INVALID_PATTERNS: &[&str] = &["denied", "invalid", "expired", "unauthorized"];

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - session is no longer valid")]
    Unauthorized,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("The requested resource was not found.")]
    NotFound,

    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("{0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Local persistence failed (the server-side operation may have
    /// succeeded).
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(extract_message(body)),
            404 => ApiError::NotFound,
            _ => ApiError::Server(extract_message(body)),
        }
    }

    /// Whether this error means the session itself is invalid (and should
    /// be torn down), as opposed to a transient failure worth retrying.
    ///
    /// Transport errors are never auth failures regardless of their message:
    /// a flaky network must not log the user out.
    pub fn is_auth_invalid(&self) -> bool {
        match self {
            ApiError::Unauthorized | ApiError::Forbidden(_) => true,
            ApiError::Network(_) => false,
            ApiError::RefreshFailed(msg) | ApiError::Server(msg) => {
                let msg = msg.to_lowercase();
                AUTH_INVALID_PATTERNS.iter().any(|p| msg.contains(p))
            }
            // A local disk failure says nothing about the session
            ApiError::NotFound | ApiError::InvalidResponse(_) | ApiError::Storage(_) => false,
        }
    }

    /// Whether the caller may retry the same operation without changing
    /// anything. Only transport-level failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

/// Pull the most specific message available out of an error response body:
/// the `message` field if the body is a JSON object carrying one, the
/// (truncated) raw body if non-empty, the generic fallback otherwise.
pub(crate) fn extract_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message.filter(|m| !m.is_empty()) {
            return message;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        GENERIC_ERROR_MESSAGE.to_string()
    } else {
        truncate_body(trimmed)
    }
}

/// Truncate a response body to avoid carrying excessive data, respecting
/// char boundaries.
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}
