//! Stored user identity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};

/// The user profile associated with the current session.
///
/// Kept as a free-form JSON object: the backend owns its shape and the client
/// only persists it next to the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Map<String, Value>);

impl Identity {
    /// Creates an empty identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds an identity from a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidIdentity` for any non-object value.
    pub fn from_value(value: Value) -> DomainResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(DomainError::InvalidIdentity("null")),
            Value::Bool(_) => Err(DomainError::InvalidIdentity("a boolean")),
            Value::Number(_) => Err(DomainError::InvalidIdentity("a number")),
            Value::String(_) => Err(DomainError::InvalidIdentity("a string")),
            Value::Array(_) => Err(DomainError::InvalidIdentity("an array")),
        }
    }

    /// Sets a single field, returning the identity for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns a field of the profile.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Shallow merge: every top-level key of `patch` overwrites the current one.
    pub fn merge(&mut self, patch: Self) {
        for (key, value) in patch.0 {
            self.0.insert(key, value);
        }
    }

    /// Returns the identity as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
