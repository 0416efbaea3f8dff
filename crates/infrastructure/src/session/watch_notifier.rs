//! Session teardown published over a watch channel.

use std::sync::Arc;

use async_trait::async_trait;
use tessera_application::ports::{IdentityStore, SessionNotifier, TokenStore};
use tessera_domain::{RefreshFailure, SessionStatus};
use tokio::sync::watch;
use tracing::{error, info};

/// Default unauthenticated entry route.
pub const DEFAULT_ENTRY_ROUTE: &str = "/";

/// Ends the session when a refresh fails.
///
/// Clears the stored token and user, then publishes
/// [`SessionStatus::Ended`] with the route the front end should navigate to.
/// Subscribers decide how to navigate; this type never does.
pub struct WatchSessionNotifier {
    tokens: Arc<dyn TokenStore>,
    identities: Arc<dyn IdentityStore>,
    entry_route: String,
    status: watch::Sender<SessionStatus>,
}

impl WatchSessionNotifier {
    /// Creates a notifier in the `Active` state.
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        identities: Arc<dyn IdentityStore>,
        entry_route: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::Active);
        Self {
            tokens,
            identities,
            entry_route: entry_route.into(),
            status,
        }
    }

    /// Receives every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// The status as last published.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Marks the session active again, after a new login.
    pub fn reactivate(&self) {
        self.status.send_if_modified(|status| {
            let changed = status.is_ended();
            *status = SessionStatus::Active;
            changed
        });
    }
}

impl std::fmt::Debug for WatchSessionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSessionNotifier")
            .field("entry_route", &self.entry_route)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionNotifier for WatchSessionNotifier {
    async fn session_ended(&self, failure: &RefreshFailure) {
        // Teardown is published even when the store could not be cleared.
        if let Err(e) = self.tokens.clear().await {
            error!(error = %e, "failed to clear stored token");
        }
        if let Err(e) = self.identities.clear_identity().await {
            error!(error = %e, "failed to clear stored user");
        }

        let published = self.status.send_if_modified(|status| {
            if status.is_ended() {
                return false;
            }
            *status = SessionStatus::Ended {
                reason: failure.to_string(),
                redirect_to: self.entry_route.clone(),
            };
            true
        });
        if published {
            info!(
                attempt = failure.attempt,
                redirect_to = %self.entry_route,
                "session ended"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tessera_application::MemoryTokenStore;
    use tessera_domain::{Identity, RefreshError, Token};

    fn notifier(store: &MemoryTokenStore) -> WatchSessionNotifier {
        WatchSessionNotifier::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            DEFAULT_ENTRY_ROUTE,
        )
    }

    #[tokio::test]
    async fn test_teardown_clears_session_and_publishes_route() {
        let store = MemoryTokenStore::with_token(Token::new("T1").unwrap());
        store.set_identity(&Identity::new().with("id", 1)).await.unwrap();
        let notifier = notifier(&store);
        let mut status = notifier.subscribe();

        notifier
            .session_ended(&RefreshFailure::new(1, RefreshError::Rejected { status: 401 }))
            .await;

        assert!(status.has_changed().unwrap());
        let published = status.borrow_and_update().clone();
        assert_eq!(published.redirect_to(), Some("/"));
        assert!(published.is_ended());
        assert_eq!(store.get().await.unwrap(), None);
        assert_eq!(store.identity().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_second_teardown_keeps_first_status() {
        let store = MemoryTokenStore::with_token(Token::new("T1").unwrap());
        let notifier = notifier(&store);
        let mut status = notifier.subscribe();

        notifier
            .session_ended(&RefreshFailure::new(1, RefreshError::MissingAccessToken))
            .await;
        let first = status.borrow_and_update().clone();
        notifier
            .session_ended(&RefreshFailure::new(2, RefreshError::Rejected { status: 401 }))
            .await;

        assert!(!status.has_changed().unwrap());
        assert_eq!(notifier.status(), first);
    }

    #[tokio::test]
    async fn test_reactivate_after_login() {
        let store = MemoryTokenStore::new();
        let notifier = notifier(&store);
        notifier
            .session_ended(&RefreshFailure::new(1, RefreshError::Timeout { timeout_ms: 10_000 }))
            .await;

        notifier.reactivate();

        assert_eq!(notifier.status(), SessionStatus::Active);
    }
}
