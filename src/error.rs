//! Muninn error types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Admission errors
    #[error("queue full ({capacity} entries)")]
    QueueFull { capacity: usize },

    #[error("request deadline exceeded after {elapsed:?}")]
    Timeout { elapsed: Duration },

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("empty response from model")]
    EmptyResponse,

    // Request-shape errors, rejected at submit
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // Parser callback failed after a successful completion
    #[error("parse error: {0}")]
    Parse(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // The pipeline was dropped while the request was queued or in flight
    #[error("pipeline shut down")]
    Shutdown,
}

impl MuninnError {
    /// Whether this error is worth retrying.
    ///
    /// Transport failures, provider 5xx, and rate limits are transient.
    /// Auth/validation (4xx), parse failures, timeouts, and local errors
    /// are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            MuninnError::Http(_) => true,
            MuninnError::RateLimited { .. } => true,
            MuninnError::Api { status, .. } => *status >= 500,
            MuninnError::EmptyResponse => true,
            _ => false,
        }
    }

    /// Server-advised backoff, if the provider supplied one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MuninnError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// The contractual error kind surfaced on responses.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MuninnError::QueueFull { .. } => ErrorKind::QueueFull,
            MuninnError::Timeout { .. } => ErrorKind::Timeout,
            MuninnError::RateLimited { .. } => ErrorKind::ProviderRateLimited,
            MuninnError::Http(_) | MuninnError::EmptyResponse => ErrorKind::ProviderTransient,
            MuninnError::Api { status, .. } if *status >= 500 => ErrorKind::ProviderTransient,
            MuninnError::Api { .. }
            | MuninnError::AuthenticationFailed
            | MuninnError::ModelNotFound(_) => ErrorKind::ProviderFatal,
            MuninnError::Parse(_) => ErrorKind::ParseError,
            MuninnError::InvalidRequest(_)
            | MuninnError::Configuration(_)
            | MuninnError::ProviderNotConfigured(_)
            | MuninnError::Json(_)
            | MuninnError::Shutdown => ErrorKind::ConfigError,
        }
    }
}

/// Contractual error kinds surfaced on [`CompletionResponse`](crate::types::CompletionResponse).
///
/// The variant names are part of the API contract; retry eligibility is
/// exactly `ProviderTransient` and `ProviderRateLimited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Backpressure at submission; surfaced immediately.
    QueueFull,
    /// Total deadline exceeded.
    Timeout,
    /// Network failure or provider 5xx; retried with backoff.
    ProviderTransient,
    /// Provider rate limit; retried, honoring server-advised backoff.
    ProviderRateLimited,
    /// Provider 4xx (auth/validation); never retried.
    ProviderFatal,
    /// Parser callback failed; the raw completion is retained.
    ParseError,
    /// Invalid request or configuration; rejected at submit.
    ConfigError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::QueueFull => "queue_full",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ProviderTransient => "provider_transient",
            ErrorKind::ProviderRateLimited => "provider_rate_limited",
            ErrorKind::ProviderFatal => "provider_fatal",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::ConfigError => "config_error",
        };
        f.write_str(name)
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
