//! HTTP client error types.
//!
//! Every failure the client can produce is a [`HttpClientError`]. Whatever the
//! variant, it can be inspected as a typed error through [`status`],
//! [`message`] and [`data`], which is what response interceptors usually look
//! at when deciding how to react.
//!
//! [`status`]: HttpClientError::status
//! [`message`]: HttpClientError::message
//! [`data`]: HttpClientError::data

use serde_json::Value;
use thiserror::Error;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Status reported for failures where no HTTP response was received.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Message used when a response body cannot be decoded.
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse response";

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("Transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Underlying transport error, when there is one.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The response body could not be decoded per its content type.
    #[error("{message}")]
    Parse {
        /// HTTP status code of the response.
        status: u16,
        /// Error message.
        message: String,
        /// Description of the decoding failure.
        data: Value,
    },

    /// The transport succeeded but the backend envelope reported a failure code.
    #[error("{message}")]
    LogicalFailure {
        /// HTTP status code of the response.
        status: u16,
        /// Envelope code, when it was an integer.
        code: Option<i64>,
        /// Envelope message.
        message: String,
        /// The whole envelope.
        envelope: Value,
    },

    /// The server answered with a status outside 200-299.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Resolved error message.
        message: String,
        /// Parsed error payload, if any.
        data: Option<Value>,
    },

    /// An interceptor failed the call.
    #[error("Interceptor error: {message}")]
    Interceptor {
        /// Status chosen by the interceptor (0 when not applicable).
        status: u16,
        /// Error message.
        message: String,
        /// Extra payload supplied by the interceptor.
        data: Option<Value>,
    },

    /// The request could not be assembled (URL, header or body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpClientError {
    /// Create an interceptor error with just a message.
    pub fn interceptor(message: impl Into<String>) -> Self {
        Self::Interceptor {
            status: TRANSPORT_FAILURE_STATUS,
            message: message.into(),
            data: None,
        }
    }

    /// Create a parse error for a response with the given status.
    pub fn parse(status: u16, detail: impl std::fmt::Display) -> Self {
        Self::Parse {
            status,
            message: PARSE_FAILURE_MESSAGE.to_string(),
            data: Value::String(detail.to_string()),
        }
    }

    /// Transport status of the failure, or `0` when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            Self::Transport { .. } | Self::InvalidRequest(_) => TRANSPORT_FAILURE_STATUS,
            Self::Parse { status, .. }
            | Self::LogicalFailure { status, .. }
            | Self::Status { status, .. }
            | Self::Interceptor { status, .. } => *status,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message, .. }
            | Self::Parse { message, .. }
            | Self::LogicalFailure { message, .. }
            | Self::Status { message, .. }
            | Self::Interceptor { message, .. } => message,
            Self::InvalidRequest(message) => message,
        }
    }

    /// Raw payload attached to the error, for caller inspection.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Parse { data, .. } => Some(data),
            Self::LogicalFailure { envelope, .. } => Some(envelope),
            Self::Status { data, .. } | Self::Interceptor { data, .. } => data.as_ref(),
            Self::Transport { .. } | Self::InvalidRequest(_) => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => {
                // Retry on 5xx server errors, request timeout and rate limit
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source: Some(e), .. } if e.is_timeout())
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Transport { source: Some(e), .. } if e.is_connect())
    }

    /// Check if the server rejected the credentials (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        self.status() == 401
    }
}

impl From<reqwest::Error> for HttpClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::InvalidRequest(err.to_string());
        }
        Self::Transport {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<url::ParseError> for HttpClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidRequest(format!("invalid URL: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transport_error_uses_sentinel_status() {
        let err = HttpClientError::Transport {
            message: "connection refused".to_string(),
            source: None,
        };
        assert_eq!(err.status(), TRANSPORT_FAILURE_STATUS);
        assert!(err.data().is_none());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_logical_failure_exposes_envelope() {
        let envelope = json!({"code": 9999, "message": "bad input", "data": null});
        let err = HttpClientError::LogicalFailure {
            status: 200,
            code: Some(9999),
            message: "bad input".to_string(),
            envelope: envelope.clone(),
        };
        assert_eq!(err.status(), 200);
        assert_eq!(err.message(), "bad input");
        assert_eq!(err.data(), Some(&envelope));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_retryability() {
        let server = HttpClientError::Status {
            status: 503,
            message: "unavailable".to_string(),
            data: None,
        };
        let client = HttpClientError::Status {
            status: 404,
            message: "missing".to_string(),
            data: None,
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn test_parse_error_message() {
        let err = HttpClientError::parse(200, "expected value at line 1");
        assert_eq!(err.message(), PARSE_FAILURE_MESSAGE);
        assert_eq!(err.to_string(), PARSE_FAILURE_MESSAGE);
        assert_eq!(err.data(), Some(&json!("expected value at line 1")));
    }

    #[test]
    fn test_unauthorized() {
        let err = HttpClientError::Status {
            status: 401,
            message: "expired".to_string(),
            data: None,
        };
        assert!(err.is_unauthorized());
        assert!(!HttpClientError::interceptor("nope").is_unauthorized());
    }
}
