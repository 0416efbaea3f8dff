//! Session use case.

use std::sync::Arc;

use tessera_domain::{Identity, Token};
use tracing::info;

use crate::ports::{IdentityStore, StoreError, TokenStore};

/// Explicit session transitions: login, profile updates and logout.
///
/// Refresh-driven transitions go through the coordinator and the session
/// notifier instead.
pub struct Session {
    tokens: Arc<dyn TokenStore>,
    identities: Arc<dyn IdentityStore>,
}

impl Session {
    /// Creates a new `Session` use case.
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenStore>, identities: Arc<dyn IdentityStore>) -> Self {
        Self { tokens, identities }
    }

    /// Stores the token and user returned by a successful login.
    ///
    /// # Errors
    /// Returns an error if either value cannot be persisted.
    pub async fn login(&self, token: &Token, user: &Identity) -> Result<(), StoreError> {
        self.tokens.set(token).await?;
        self.identities.set_identity(user).await?;
        info!(token = %token.preview(), "logged in");
        Ok(())
    }

    /// Merges `patch` into the stored user, top-level keys only.
    ///
    /// Does nothing when no user is stored. Returns the updated user.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub async fn update_user(&self, patch: Identity) -> Result<Option<Identity>, StoreError> {
        let Some(mut user) = self.identities.identity().await? else {
            return Ok(None);
        };
        user.merge(patch);
        self.identities.set_identity(&user).await?;
        Ok(Some(user))
    }

    /// Forgets the token and the user.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    pub async fn logout(&self) -> Result<(), StoreError> {
        self.tokens.clear().await?;
        self.identities.clear_identity().await?;
        info!("logged out");
        Ok(())
    }

    /// The stored user, if any.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn current_user(&self) -> Result<Option<Identity>, StoreError> {
        self.identities.identity().await
    }

    /// Whether a token is stored.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn is_authenticated(&self) -> Result<bool, StoreError> {
        Ok(self.tokens.get().await?.is_some())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn session() -> (Session, MemoryTokenStore) {
        let store = MemoryTokenStore::new();
        let session = Session::new(Arc::new(store.clone()), Arc::new(store.clone()));
        (session, store)
    }

    fn user(value: serde_json::Value) -> Identity {
        Identity::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let (session, store) = session();
        let token = Token::new("T1").unwrap();

        session
            .login(&token, &user(json!({"id": 1, "name": "Ana"})))
            .await
            .unwrap();
        assert!(session.is_authenticated().await.unwrap());
        assert_eq!(store.get().await.unwrap(), Some(token));

        session.logout().await.unwrap();
        assert!(!session.is_authenticated().await.unwrap());
        assert_eq!(session.current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_user_is_shallow_merge() {
        let (session, _store) = session();
        session
            .login(
                &Token::new("T1").unwrap(),
                &user(json!({"id": 1, "prefs": {"theme": "dark", "lang": "es"}})),
            )
            .await
            .unwrap();

        let updated = session
            .update_user(user(json!({"prefs": {"theme": "light"}, "name": "Ana"})))
            .await
            .unwrap();

        let expected = user(json!({"id": 1, "name": "Ana", "prefs": {"theme": "light"}}));
        assert_eq!(updated, Some(expected.clone()));
        assert_eq!(session.current_user().await.unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn test_update_user_without_session_is_noop() {
        let (session, _store) = session();

        let updated = session.update_user(user(json!({"name": "Ana"}))).await.unwrap();

        assert_eq!(updated, None);
        assert_eq!(session.current_user().await.unwrap(), None);
    }
}
