//! Request specification type

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::{AUTHORIZATION, Header, Headers, HttpMethod, RequestBody};
use crate::auth::Token;
use crate::error::{DomainError, DomainResult};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Everything needed to send one HTTP request.
///
/// Attaching a credential produces a new request; the caller's value is
/// never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Identifier used to correlate log lines for this request
    pub id: Uuid,
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute target URL
    pub url: String,
    /// HTTP headers
    #[serde(default)]
    pub headers: Headers,
    /// Request body
    #[serde(default)]
    pub body: RequestBody,
    /// Timeout for this request in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl RequestSpec {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            method,
            url: url.into(),
            headers: Headers::new(),
            body: RequestBody::Empty,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(Header::new(name, value));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Returns this request carrying `token` as its bearer credential.
    ///
    /// Any `Authorization` header already present is replaced; with no token
    /// the header is removed entirely.
    #[must_use]
    pub fn authorized(mut self, token: Option<&Token>) -> Self {
        match token {
            Some(token) => self.headers.set(AUTHORIZATION, token.bearer_header()),
            None => self.headers.remove(AUTHORIZATION),
        }
        self
    }

    /// Returns the `Authorization` header value, if any.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)
    }

    /// Validates the URL and returns the parsed version.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or not http(s).
    pub fn parse_url(&self) -> DomainResult<Url> {
        let url =
            Url::parse(&self.url).map_err(|e| DomainError::InvalidUrl(format!("{e}: {}", self.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(DomainError::InvalidUrl(format!(
                "unsupported scheme {other}: {}",
                self.url
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_authorized_replaces_existing_credential() {
        let token = Token::new("T2").unwrap();
        let request = RequestSpec::get("https://api.example.com/photos")
            .with_header("authorization", "Bearer T1")
            .authorized(Some(&token));

        assert_eq!(request.authorization(), Some("Bearer T2"));
        assert_eq!(request.headers.len(), 1);
    }

    #[test]
    fn test_authorized_without_token_drops_header() {
        let request = RequestSpec::get("https://api.example.com/photos")
            .with_header("Authorization", "Bearer stale")
            .authorized(None);

        assert_eq!(request.authorization(), None);
    }

    #[test]
    fn test_parse_url() {
        assert!(RequestSpec::get("https://api.example.com/x").parse_url().is_ok());
        assert!(RequestSpec::get("ftp://example.com").parse_url().is_err());
        assert!(RequestSpec::get("not a url").parse_url().is_err());
    }
}
