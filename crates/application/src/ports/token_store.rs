//! Token and identity persistence ports

use async_trait::async_trait;
use thiserror::Error;
use tessera_domain::{Identity, Token};

/// Errors that can occur while reading or writing the session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing storage could not be read or written.
    #[error("I/O error: {0}")]
    Io(String),

    /// The stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable storage for the current access token.
///
/// A pure store: it performs no validation of token shape or expiry.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the current token, or `None` when there is no session.
    async fn get(&self) -> Result<Option<Token>, StoreError>;

    /// Replaces the current token.
    async fn set(&self, token: &Token) -> Result<(), StoreError>;

    /// Removes the current token.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Durable storage for the profile of the logged-in user.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns the stored identity, if any.
    async fn identity(&self) -> Result<Option<Identity>, StoreError>;

    /// Replaces the stored identity.
    async fn set_identity(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Removes the stored identity.
    async fn clear_identity(&self) -> Result<(), StoreError>;
}
