//! Error types for ProjectSearchBar.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::time::Duration;

/// Errors from the HTTP client layer (arXiv and the chat model endpoint).
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Rate limited by the remote service (429 response)
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested wait time before retry
        retry_after: Duration,
    },

    /// Resource not found (404 response)
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// Invalid request parameters (400 response)
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message from the service
        message: String,
    },

    /// Request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// JSON parsing error
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Server error (5xx response)
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Unexpected HTTP status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Local file I/O while saving a download
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Create a rate limited error with retry-after duration.
    #[must_use]
    pub fn rate_limited(seconds: u64) -> Self {
        Self::RateLimited { retry_after: Duration::from_secs(seconds) }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    /// Create a server error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server { status, message: message.into() }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout(_) | Self::Server { .. })
    }

    /// Get the retry-after duration if this is a rate limit error.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Errors from the SQLite store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure while opening the database
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A lock guarding the connection was poisoned by a panicking thread
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors from tool execution, shared by the HTTP API, MCP and the CLI.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// Error from a remote client
    #[error("Remote error: {0}")]
    Client(#[from] ClientError),

    /// Error from the store
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Input validation failed
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested paper does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal tool logic error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Resource not available (no chat model configured, offline mode)
    #[error("Resource unavailable: {0}")]
    Unavailable(String),
}

impl ToolError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// HTTP status code this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::Serialization(_) => 400,
            Self::NotFound(_) | Self::Store(StoreError::NotFound(_)) => 404,
            Self::Client(ClientError::RateLimited { .. }) => 429,
            Self::Unavailable(_) => 503,
            Self::Client(_) => 502,
            Self::Store(_) | Self::Internal(_) => 500,
        }
    }

    /// Convert to a user-friendly error message.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::Client(ClientError::RateLimited { retry_after }) => {
                format!(
                    "Rate limited by the remote service. Please wait {:?} before retrying.",
                    retry_after
                )
            }
            Self::NotFound(what) | Self::Store(StoreError::NotFound(what)) => {
                format!("Not found: {what}. Please check the arXiv id is indexed.")
            }
            Self::Validation { field, message } => {
                format!("Invalid input for '{field}': {message}")
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_retryable() {
        assert!(ClientError::rate_limited(60).is_retryable());
        assert!(ClientError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(ClientError::server(503, "Service Unavailable").is_retryable());

        assert!(!ClientError::not_found("2101.00001").is_retryable());
        assert!(!ClientError::bad_request("bad id_list").is_retryable());
    }

    #[test]
    fn test_client_error_retry_after() {
        let err = ClientError::rate_limited(60);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));

        let err = ClientError::not_found("paper");
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_tool_error_user_message() {
        let err = ToolError::validation("query", "cannot be empty");
        assert!(err.to_user_message().contains("query"));
        assert!(err.to_user_message().contains("cannot be empty"));
    }

    #[test]
    fn test_tool_error_status_codes() {
        assert_eq!(ToolError::validation("limit", "too big").status_code(), 400);
        assert_eq!(ToolError::not_found("2101.00001").status_code(), 404);
        assert_eq!(ToolError::Store(StoreError::NotFound("x".into())).status_code(), 404);
        assert_eq!(ToolError::Client(ClientError::rate_limited(3)).status_code(), 429);
        assert_eq!(ToolError::unavailable("no model").status_code(), 503);
        assert_eq!(ToolError::internal("boom").status_code(), 500);
    }
}
