//! Error types for forgekit.
//!
//! Every driver reports failures through the same [`Error`] enum, so calling
//! code can branch on one set of values no matter which provider is active.
//! Non-2xx responses are translated here via [`Error::from_status`].

use thiserror::Error;

use crate::transport::RawResponse;

/// Main error type for forgekit operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Connection, DNS, TLS or timeout failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Provider returned 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider returned 401
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-2xx response
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A 2xx response whose body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// The active provider has no such operation
    #[error("Operation not supported by this provider")]
    Unsupported,

    /// Caller input rejected before any request was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Cancelled,
    HttpStatus,
    Decode,
    Unsupported,
    Validation,
    Config,
}

/// Result type alias for forgekit operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Translate a non-success status and its body into an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(status, body);
        match status {
            401 => Error::Unauthorized(message),
            404 => Error::NotFound(message),
            _ => Error::Status { status, message },
        }
    }

    /// Map a reqwest failure that happened before a response was received.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Transport(format!("request timed out: {}", err))
        } else {
            Error::Transport(err.to_string())
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::NotFound(_) | Error::Unauthorized(_) | Error::Status { .. } => {
                ErrorKind::HttpStatus
            }
            Error::Decode(_) => ErrorKind::Decode,
            Error::Unsupported => ErrorKind::Unsupported,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status code, for errors that came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::NotFound(_) => Some(404),
            Error::Unauthorized(_) => Some(401),
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported)
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Pass a 2xx response through, translate anything else.
pub fn check(response: RawResponse) -> Result<RawResponse> {
    if response.is_success() {
        return Ok(response);
    }
    let body = String::from_utf8_lossy(&response.body);
    tracing::warn!(
        status = response.status,
        message = %body,
        "API error response"
    );
    Err(Error::from_status(response.status, &body))
}

/// Best-effort human readable message from a provider error body.
///
/// Known shapes:
/// - Gitea: `{"message": "...", "url": "..."}`
/// - GitLab: `{"message": "..."}`, `{"message": ["..", ".."]}`, `{"error": "..."}`
/// - Bitbucket Server: `{"errors": [{"message": "..."}]}`
pub fn extract_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(message) = json
            .get("errors")
            .and_then(|e| e.as_array())
            .and_then(|arr| arr.first())
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }

        match json.get("message") {
            Some(serde_json::Value::String(message)) => return message.clone(),
            Some(serde_json::Value::Array(messages)) => {
                let joined: Vec<&str> = messages.iter().filter_map(|m| m.as_str()).collect();
                if !joined.is_empty() {
                    return joined.join("; ");
                }
            }
            Some(serde_json::Value::Object(fields)) => {
                // GitLab validation errors: {"message": {"field": ["is invalid"]}}
                let joined: Vec<String> = fields
                    .iter()
                    .map(|(field, value)| match value {
                        serde_json::Value::Array(items) => {
                            let items: Vec<&str> = items.iter().filter_map(|i| i.as_str()).collect();
                            format!("{} {}", field, items.join(", "))
                        }
                        other => format!("{} {}", field, other),
                    })
                    .collect();
                if !joined.is_empty() {
                    return joined.join("; ");
                }
            }
            _ => {}
        }

        if let Some(error) = json.get("error") {
            if let Some(message) = error.as_str() {
                return message.to_string();
            }
            if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
                return message.to_string();
            }
        }
    }

    if trimmed.is_empty() {
        return reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unknown error")
            .to_string();
    }

    trimmed.to_string()
}
