//! Domain error types

use thiserror::Error;

/// Domain-level errors raised while building or validating values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The provided URL is invalid or malformed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A header name is not a legal HTTP token.
    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),

    /// A header value contains characters that cannot be sent on the wire.
    #[error("invalid header value for {0}")]
    InvalidHeaderValue(String),

    /// The HTTP method is not supported.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// A bearer token was empty or not usable as a header value.
    #[error("invalid token: {0}")]
    InvalidToken(&'static str),

    /// A stored identity was not a JSON object.
    #[error("invalid identity: expected a JSON object, got {0}")]
    InvalidIdentity(&'static str),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
