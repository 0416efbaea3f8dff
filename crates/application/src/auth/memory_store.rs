//! In-memory session storage.
//!
//! Holds the access token and the user identity for the lifetime of the
//! process. Used by tests and by embedders that manage persistence
//! themselves.

use std::sync::Arc;

use async_trait::async_trait;
use tessera_domain::{Identity, Token};
use tokio::sync::RwLock;

use crate::ports::{IdentityStore, StoreError, TokenStore};

#[derive(Debug, Default)]
struct Slots {
    token: Option<Token>,
    identity: Option<Identity>,
}

/// Thread-safe in-memory token and identity store.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slots: Arc<RwLock<Slots>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `token`.
    #[must_use]
    pub fn with_token(token: Token) -> Self {
        Self {
            slots: Arc::new(RwLock::new(Slots {
                token: Some(token),
                identity: None,
            })),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self) -> Result<Option<Token>, StoreError> {
        Ok(self.slots.read().await.token.clone())
    }

    async fn set(&self, token: &Token) -> Result<(), StoreError> {
        self.slots.write().await.token = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.slots.write().await.token = None;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryTokenStore {
    async fn identity(&self) -> Result<Option<Identity>, StoreError> {
        Ok(self.slots.read().await.identity.clone())
    }

    async fn set_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        self.slots.write().await.identity = Some(identity.clone());
        Ok(())
    }

    async fn clear_identity(&self) -> Result<(), StoreError> {
        self.slots.write().await.identity = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_clear_token() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get().await.unwrap(), None);

        store.set(&Token::new("abc").unwrap()).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(Token::new("abc").unwrap()));

        store.clear().await.unwrap();
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryTokenStore::with_token(Token::new("one").unwrap());
        let other = store.clone();

        other.set(&Token::new("two").unwrap()).await.unwrap();

        assert_eq!(store.get().await.unwrap(), Some(Token::new("two").unwrap()));
    }

    #[tokio::test]
    async fn test_identity_is_independent_of_token() {
        let store = MemoryTokenStore::with_token(Token::new("abc").unwrap());
        let identity = Identity::from_value(json!({"id": 7})).unwrap();

        store.set_identity(&identity).await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.identity().await.unwrap(), Some(identity));
        store.clear_identity().await.unwrap();
        assert_eq!(store.identity().await.unwrap(), None);
    }
}
