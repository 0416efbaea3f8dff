//! Token refresh port

use async_trait::async_trait;
use tessera_domain::{RefreshError, Token};

/// Exchanges the current credential for a new one.
///
/// Implementations perform exactly one call per invocation and never retry:
/// retry policy belongs to the caller.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Requests a new access token, presenting `current` as the credential.
    async fn refresh(&self, current: Option<&Token>) -> Result<Token, RefreshError>;
}
