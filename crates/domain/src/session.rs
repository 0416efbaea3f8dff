//! Persisted session document and session lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{Identity, Token};

/// Current version of the persisted session format.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// What survives a restart: the token and the user it belongs to.
///
/// ```json
/// {
///   "schema_version": 1,
///   "token": "eyJhbGciOi...",
///   "user": { "id": 7, "name": "Ana" },
///   "updated_at": "2026-10-18T09:30:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Format version
    pub schema_version: u32,
    /// Current access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    /// Profile of the logged-in user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
    /// Last time the record was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            schema_version: SESSION_SCHEMA_VERSION,
            token: None,
            user: None,
            updated_at: None,
        }
    }

    /// Returns true if neither a token nor a user is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none()
    }
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Session lifecycle as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Requests are being authenticated normally.
    #[default]
    Active,
    /// The session was torn down; the user must go back to the entry point.
    Ended {
        /// Human-readable cause of the teardown.
        reason: String,
        /// Unauthenticated route to return to.
        redirect_to: String,
    },
}

impl SessionStatus {
    /// Returns true once the session has been torn down.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }

    /// The route to navigate to, if the session ended.
    #[must_use]
    pub fn redirect_to(&self) -> Option<&str> {
        match self {
            Self::Active => None,
            Self::Ended { redirect_to, .. } => Some(redirect_to),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_record_uses_fixed_keys() {
        let record = SessionRecord {
            token: Some(Token::new("T1").unwrap()),
            user: Some(Identity::new().with("name", "Ana")),
            ..SessionRecord::new()
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({"schema_version": 1, "token": "T1", "user": {"name": "Ana"}})
        );
    }

    #[test]
    fn test_empty_record_roundtrip() {
        let record: SessionRecord = serde_json::from_str(r#"{"schema_version":1}"#).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_status_redirect() {
        let ended = SessionStatus::Ended {
            reason: "token refresh #1 failed".to_string(),
            redirect_to: "/".to_string(),
        };
        assert!(ended.is_ended());
        assert_eq!(ended.redirect_to(), Some("/"));
        assert_eq!(SessionStatus::Active.redirect_to(), None);
    }
}
