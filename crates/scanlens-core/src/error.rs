//! Error types for the Scanlens orchestration layer.
//!
//! Two families of errors live here: local errors (`ScanError` and friends)
//! that surface through `Result`, and the raw `ProviderError` that adapters
//! return for the classifier to judge. Classification policy itself lives in
//! `classify`.

use thiserror::Error;

/// Top-level error type for Scanlens operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image conditioning errors
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Image conditioning errors. Both variants are terminal: a payload that
/// cannot be decoded or is oversized is never retried.
#[derive(Error, Debug)]
pub enum ImageError {
    /// Source bytes could not be decoded as an image
    #[error("Cannot decode image: {0}")]
    Decode(String),

    /// Payload exceeds the configured upload limit
    #[error("Image too large: {size_mb}MB > {max_mb}MB")]
    TooLarge { size_mb: u64, max_mb: u64 },

    /// Re-encoding the conditioned image failed
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Where in the transport stack a provider error originated.
///
/// The classifier keys on this alongside HTTP status and message content,
/// so adapters must preserve it when wrapping reqwest errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// TCP/TLS connection could not be established
    Connect,
    /// The call exceeded its per-call budget
    TimedOut,
    /// The provider answered with a non-success HTTP status
    Status,
    /// The response body could not be read or parsed
    Body,
    /// Anything else (DNS, protocol errors, ...)
    Other,
}

/// Raw error from a provider adapter, before classification.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ProviderError {
    /// Human-readable description from the transport or provider
    pub message: String,
    /// HTTP status code, when one was received
    pub status: Option<u16>,
    /// Transport-level origin of the failure
    pub kind: TransportKind,
}

impl ProviderError {
    /// Wrap a reqwest transport error, preserving its origin.
    pub fn transport(context: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::TimedOut
        } else if err.is_connect() {
            TransportKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportKind::Body
        } else {
            TransportKind::Other
        };
        Self {
            message: format!("{context}: {err}"),
            status: err.status().map(|s| s.as_u16()),
            kind,
        }
    }

    /// A non-success HTTP status with the (possibly truncated) body.
    pub fn http_status(provider: &str, status: u16, body: &str) -> Self {
        Self {
            message: format!("{provider} HTTP {status}: {body}"),
            status: Some(status),
            kind: TransportKind::Status,
        }
    }

    /// A response that arrived but could not be interpreted.
    pub fn bad_body(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            kind: TransportKind::Body,
        }
    }
}

/// Convenience type alias for Scanlens results.
pub type Result<T> = std::result::Result<T, ScanError>;
