//! Error types for the pack API client.
//!
//! # Design
//! `RateLimited` is the only variant reported as fatal: the service asks
//! clients to stop sending once the request limit is hit, and callers that
//! keep the default policy are expected to abort on it. Service errors keep
//! the envelope's code and message so callers can branch on them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by `PackClient` and the file codec helpers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The operation needs an API key and the client was built without one.
    #[error("an API key must be set in order to make this request")]
    MissingApiKey,

    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The envelope carried `error: true`.
    #[error("service error (code {}): {message}", display_code(.code))]
    Service { code: Option<u16>, message: String },

    /// The service answered 429 and force-run is disabled.
    #[error("API request limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("failed to read {}: {source}", .path.display())]
    ReadFile { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", .path.display())]
    WriteFile { path: PathBuf, source: io::Error },

    /// A raw upload was not valid UTF-8 text.
    #[error("{} is not valid UTF-8 text", .path.display())]
    NotUtf8 { path: PathBuf },

    /// A save was requested but the envelope had no `data` field.
    #[error("response carried no data to save")]
    MissingData,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The response body could not be decoded into an envelope.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be encoded to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Whether the caller should stop issuing requests altogether.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    /// The service's numeric code, when the error came from an envelope.
    pub fn code(&self) -> Option<u16> {
        match self {
            ApiError::Service { code, .. } => *code,
            ApiError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

fn display_code(code: &Option<u16>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// A network-level failure reported by a `Transport`.
#[derive(Debug, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
