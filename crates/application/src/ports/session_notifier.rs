//! Session teardown port

use async_trait::async_trait;
use tessera_domain::RefreshFailure;

/// Collaborator told when a session can no longer be recovered.
///
/// Implementations clear any cached identity and send the user back to the
/// unauthenticated entry point. Calling it more than once must have the same
/// effect as calling it once.
#[async_trait]
pub trait SessionNotifier: Send + Sync {
    /// The refresh attempt described by `failure` failed; end the session.
    async fn session_ended(&self, failure: &RefreshFailure);
}
