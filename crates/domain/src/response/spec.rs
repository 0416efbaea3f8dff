//! Response specification type

use std::borrow::Cow;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::request::Headers;

/// Status code that marks an expired or rejected credential.
pub const UNAUTHORIZED: u16 = 401;

/// HTTP response as returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseSpec {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Raw response body
    pub body: Vec<u8>,
    /// Time from send to last body byte
    pub duration: Duration,
}

impl ResponseSpec {
    /// Creates a response.
    #[must_use]
    pub const fn new(status: u16, headers: Headers, body: Vec<u8>, duration: Duration) -> Self {
        Self {
            status,
            headers,
            body,
            duration,
        }
    }

    /// Creates a response with only a status code, mostly for tests and mocks.
    #[must_use]
    pub const fn with_status(status: u16) -> Self {
        Self::new(status, Headers::new(), Vec::new(), Duration::ZERO)
    }

    /// Returns true if the status code indicates success (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns true for the authentication-failure signal (401).
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.status == UNAUTHORIZED
    }

    /// Returns true if the status code indicates a client error (4xx).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Returns true if the status code indicates a server error (5xx).
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Body decoded as UTF-8, invalid sequences replaced.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
