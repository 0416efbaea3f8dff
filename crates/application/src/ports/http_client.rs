//! HTTP client port

use std::future::Future;

use thiserror::Error;
use tessera_domain::{request::RequestSpec, response::ResponseSpec};

/// Failures that prevented a response from being received at all.
///
/// Non-success statuses are not errors at this level: they come back as a
/// `ResponseSpec` and callers decide what they mean.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpClientError {
    /// The URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The body could not be encoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// No response within the request timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that expired.
        timeout_ms: u64,
    },

    /// The host name did not resolve.
    #[error("could not resolve {host}: {message}")]
    DnsError {
        /// Host that failed to resolve.
        host: String,
        /// Resolver message.
        message: String,
    },

    /// The server refused the connection.
    #[error("connection refused by {host}:{port}")]
    ConnectionRefused {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
    },

    /// The connection failed for another reason (TLS, reset, ...).
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Redirect limit exceeded.
    #[error("too many redirects (max {max})")]
    TooManyRedirects {
        /// Configured redirect limit.
        max: usize,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Port for executing HTTP requests.
///
/// This trait abstracts the HTTP client implementation, allowing
/// the application layer to be independent of specific HTTP libraries.
pub trait HttpClient: Send + Sync {
    /// Executes an HTTP request and returns the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was received: network issues,
    /// timeout, or a request that could not be built.
    fn execute(
        &self,
        request: &RequestSpec,
    ) -> impl Future<Output = Result<ResponseSpec, HttpClientError>> + Send;
}
