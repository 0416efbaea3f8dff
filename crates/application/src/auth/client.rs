//! HTTP client that authenticates requests and recovers from expired tokens.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tessera_domain::{
    RefreshFailure,
    request::{PendingRequest, RequestSpec},
    response::ResponseSpec,
};
use tracing::{debug, warn};

use super::RefreshCoordinator;
use crate::error::{ClientError, ClientResult};
use crate::ports::{HttpClient, SessionNotifier, TokenStore};

/// Sends requests with the stored bearer token and handles 401 responses.
///
/// A 401 on the first send suspends the request until the
/// [`RefreshCoordinator`] produces a new token, then re-sends it exactly once.
/// A failed refresh ends the session through the [`SessionNotifier`].
pub struct AuthenticatedClient<C> {
    transport: Arc<C>,
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn SessionNotifier>,
    coordinator: RefreshCoordinator,
    /// Highest refresh attempt whose failure was reported to the notifier.
    ended_attempt: AtomicU64,
}

impl<C: HttpClient> AuthenticatedClient<C> {
    /// Creates a client over `transport`.
    ///
    /// `store` must be the same store the coordinator persists into.
    #[must_use]
    pub fn new(
        transport: Arc<C>,
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn SessionNotifier>,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            transport,
            store,
            notifier,
            coordinator,
            ended_attempt: AtomicU64::new(0),
        }
    }

    /// The coordinator serializing this client's refreshes.
    #[must_use]
    pub const fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Returns `request` with the stored token as its bearer credential.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Store` if the token store cannot be read.
    pub async fn attach_credential(&self, request: RequestSpec) -> ClientResult<RequestSpec> {
        let token = self.store.get().await?;
        Ok(request.authorized(token.as_ref()))
    }

    /// Sends `request`, refreshing the token and retrying once on 401.
    ///
    /// Every status other than 401 is returned as `Ok`, whatever the attempt.
    ///
    /// # Errors
    ///
    /// - `ClientError::Transport` when no response was received.
    /// - `ClientError::Refresh` when the token could not be refreshed; the
    ///   session has been ended by then.
    /// - `ClientError::Unauthorized` when the retry was rejected too.
    /// - `ClientError::Store` when the token store cannot be read.
    pub async fn send(&self, request: RequestSpec) -> ClientResult<ResponseSpec> {
        let mut pending = PendingRequest::new(request);
        let ticket = self.coordinator.ticket().await?;
        let mut credential = ticket.credential().cloned();

        loop {
            let outgoing = pending.request().clone().authorized(credential.as_ref());
            let response = self.transport.execute(&outgoing).await?;

            if !response.is_unauthorized() {
                return Ok(response);
            }

            let Some(retry) = pending.into_retry() else {
                warn!(
                    request_id = %outgoing.id,
                    url = %outgoing.url,
                    "request rejected again after token refresh"
                );
                return Err(ClientError::Unauthorized {
                    url: outgoing.url,
                    response: Box::new(response),
                });
            };
            pending = retry;

            debug!(request_id = %outgoing.id, url = %outgoing.url, "401 received, awaiting fresh token");
            match self.coordinator.obtain_fresh_token(&ticket).await {
                Ok(token) => credential = Some(token),
                Err(failure) => {
                    self.end_session(&failure).await;
                    return Err(failure.into());
                }
            }
        }
    }

    async fn end_session(&self, failure: &RefreshFailure) {
        let previous = self
            .ended_attempt
            .fetch_max(failure.attempt, Ordering::AcqRel);
        if previous < failure.attempt {
            warn!(attempt = failure.attempt, error = %failure.cause, "ending session");
            self.notifier.session_ended(failure).await;
        }
    }
}

impl<C> std::fmt::Debug for AuthenticatedClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
