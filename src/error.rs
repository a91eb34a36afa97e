//! Munin error types

use std::time::Duration;

/// Munin error types
#[derive(Debug, thiserror::Error)]
pub enum MuninError {
    // Network-level errors (DNS, connect, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Remote endpoint answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Cache or rate-limit backing store failure. Callers treat these as
    /// advisory: the cache reports a miss, the limiter fails open.
    #[error("backend error: {0}")]
    Backend(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    Invalid(String),

    // Configuration errors
    #[error("no completion provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),

    /// External completion service failure.
    #[error("provider error: {0}")]
    Provider(String),
}

impl MuninError {
    /// Whether the error is transient and the operation is safely re-issuable.
    ///
    /// Network failures, rate limiting, backend hiccups, and 5xx responses
    /// qualify; client input errors (4xx) and configuration errors never do.
    pub fn is_transient(&self) -> bool {
        match self {
            MuninError::Http(_) | MuninError::RateLimited { .. } | MuninError::Backend(_) => true,
            MuninError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the error is a client input problem (4xx) that retrying
    /// cannot fix.
    pub fn is_client_error(&self) -> bool {
        matches!(self, MuninError::Api { status, .. } if (400..500).contains(status))
    }

    /// Extract the retry-after hint, if the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MuninError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Human-readable message derived from the error's classification,
    /// suitable for surfacing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            MuninError::Http(_) => {
                "Unable to connect to the server. Please check your connection and try again."
                    .to_string()
            }
            MuninError::RateLimited { .. } => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            MuninError::Api { status: 404, .. } => {
                "The requested resource was not found.".to_string()
            }
            MuninError::Api { status: 401, .. } | MuninError::Api { status: 403, .. } => {
                "You do not have permission to access this resource.".to_string()
            }
            MuninError::Api { status, .. } if *status >= 500 => {
                "A server error occurred. Please try again later.".to_string()
            }
            MuninError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for MuninError {
    fn from(err: reqwest::Error) -> Self {
        MuninError::Http(err.to_string())
    }
}

impl From<redis::RedisError> for MuninError {
    fn from(err: redis::RedisError) -> Self {
        MuninError::Backend(err.to_string())
    }
}

/// Result type alias for Munin operations
pub type Result<T> = std::result::Result<T, MuninError>;
