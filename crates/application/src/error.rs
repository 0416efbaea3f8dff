//! Application error types

use thiserror::Error;
use tessera_domain::{RefreshFailure, response::ResponseSpec};

use crate::ports::{HttpClientError, StoreError};

/// Errors returned by [`AuthenticatedClient`](crate::auth::AuthenticatedClient).
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The transport produced no response; passed through unchanged.
    #[error("HTTP error: {0}")]
    Transport(#[from] HttpClientError),

    /// The request was rejected with 401 even after a refresh and retry.
    #[error("request to {url} still unauthorized after refreshing the token")]
    Unauthorized {
        /// URL of the rejected request.
        url: String,
        /// The final 401 response.
        response: Box<ResponseSpec>,
    },

    /// The token refresh failed; the session has been ended.
    #[error(transparent)]
    Refresh(#[from] RefreshFailure),

    /// The token store could not be read while attaching the credential.
    #[error("token store error: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    /// Returns true if this error ended the session.
    #[must_use]
    pub const fn is_session_ended(&self) -> bool {
        matches!(self, Self::Refresh(_))
    }
}

/// Result type alias for authenticated client operations.
pub type ClientResult<T> = Result<T, ClientError>;
