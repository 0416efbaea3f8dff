//! Request body

use serde::{Deserialize, Serialize};

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Raw payload sent verbatim
    Raw {
        /// The content type (e.g., "application/json", "text/plain")
        content_type: String,
        /// The payload
        content: String,
    },
}

impl RequestBody {
    /// Creates a JSON body.
    #[must_use]
    pub fn json(content: impl Into<String>) -> Self {
        Self::Raw {
            content_type: "application/json".to_string(),
            content: content.into(),
        }
    }

    /// Creates a plain text body.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Raw {
            content_type: "text/plain".to_string(),
            content: content.into(),
        }
    }

    /// Returns whether there is nothing to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Raw { content, .. } => content.is_empty(),
        }
    }

    /// Returns the content type if there is a payload.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Raw { content_type, .. } => Some(content_type),
        }
    }

    /// Returns the payload, empty for `Empty`.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Raw { content, .. } => content,
        }
    }
}
