//! Typed errors for SharePoint operations
//!
//! Every failure crossing a public boundary is an [`ApiError`]. The
//! classification fields (`status_code`, `is_retryable`, `retry_after_seconds`)
//! are fixed at construction time; service layers only enrich the message
//! when re-throwing with operation context.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error raised by any SharePoint API operation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable description, possibly enriched with operation context.
    pub message: String,
    /// HTTP status of the failing response; `None` when the request never
    /// produced a response (connect failure, timeout).
    pub status_code: Option<u16>,
    /// Vendor error code when the response carried one, otherwise a
    /// synthetic `HTTP_<status>` or transport code.
    pub error_code: String,
    /// Whether the retry policy may re-attempt the request.
    pub is_retryable: bool,
    /// Parsed `Retry-After` header, when the platform sent one.
    pub retry_after_seconds: Option<u64>,
}

impl ApiError {
    pub fn new(
        message: impl Into<String>,
        status_code: Option<u16>,
        error_code: impl Into<String>,
        is_retryable: bool,
    ) -> Self {
        Self {
            message: message.into(),
            status_code,
            error_code: error_code.into(),
            is_retryable,
            retry_after_seconds: None,
        }
    }

    /// Error for missing or invalid client configuration.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(message, None, "CONFIGURATION_ERROR", false)
    }

    /// Prefix the message with operation context, keeping classification intact.
    pub fn with_context(mut self, context: &str) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        // Connect failures and timeouts are transient by nature; anything
        // that reached the server and failed is classified from the response
        // instead and never takes this path with a status attached.
        let is_retryable = err.is_timeout() || err.is_connect() || err.is_request();
        Self {
            message: format!("Request failed: {err}"),
            status_code: err.status().map(|s| s.as_u16()),
            error_code: "NETWORK_ERROR".to_string(),
            is_retryable,
            retry_after_seconds: None,
        }
    }
}
