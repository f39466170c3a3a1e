//! Transport errors raised by model providers

use thiserror::Error;

/// Failure talking to a model provider
///
/// Any of these aborts the current turn. Nothing here is retried.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Missing API key
    #[error("API key is required for {provider}")]
    MissingApiKey { provider: String },

    /// API request failed
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Rate limited
    #[error("{provider} rate limited: {message}")]
    RateLimited { provider: String, message: String },

    /// Network/HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response did not have the expected shape
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    /// The send did not complete within the configured timeout
    #[error("{provider} request timed out after {seconds:.1}s")]
    Timeout { provider: String, seconds: f64 },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a missing API key error
    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a rate limited error
    pub fn rate_limited(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status and body to an error
    pub fn from_status(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        if status == 429 {
            Self::rate_limited(provider, body)
        } else {
            Self::api(provider, status, body)
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
