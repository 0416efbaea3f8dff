//! Bearer access token.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Scheme used when a token is presented in the `Authorization` header.
pub const BEARER_SCHEME: &str = "Bearer";

/// Opaque bearer credential.
///
/// The client never inspects the token: its expiry is only discovered when a
/// server answers with 401. The only checks made here are the ones needed to
/// put the value on the wire as a header.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    /// Creates a token from its raw value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidToken` if the value is empty or contains
    /// characters that cannot appear in a header value.
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidToken("token is empty"));
        }
        if value.chars().any(|c| c.is_control() || !c.is_ascii()) {
            return Err(DomainError::InvalidToken(
                "token contains non-printable or non-ASCII characters",
            ));
        }
        Ok(Self(value))
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the value for an `Authorization` header.
    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("{BEARER_SCHEME} {}", self.0)
    }

    /// Short, log-safe preview of the token (first 8 chars + ...).
    #[must_use]
    pub fn preview(&self) -> String {
        if self.0.len() > 12 {
            format!("{}...", &self.0[..8])
        } else {
            "***".to_string()
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.preview()).finish()
    }
}

impl TryFrom<String> for Token {
    type Error = DomainError;

    fn try_from(value: String) -> DomainResult<Self> {
        Self::new(value)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}
