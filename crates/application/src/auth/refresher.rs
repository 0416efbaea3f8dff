//! Token refresh over the backend's refresh endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tessera_domain::{RefreshError, Token, request::RequestSpec};
use tracing::debug;

use crate::ports::{HttpClient, TokenRefresher};

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Calls `POST <refresh_url>` with the current token as bearer.
///
/// Uses the raw transport, so its own 401 never loops back into the
/// authenticated client.
#[derive(Debug)]
pub struct EndpointRefresher<C> {
    transport: Arc<C>,
    refresh_url: String,
    timeout_ms: Option<u64>,
}

impl<C> EndpointRefresher<C> {
    /// Creates a refresher posting to `refresh_url`.
    #[must_use]
    pub fn new(transport: Arc<C>, refresh_url: impl Into<String>) -> Self {
        Self {
            transport,
            refresh_url: refresh_url.into(),
            timeout_ms: None,
        }
    }

    /// Overrides the request timeout of the refresh call.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// The endpoint this refresher posts to.
    #[must_use]
    pub fn refresh_url(&self) -> &str {
        &self.refresh_url
    }
}

#[async_trait]
impl<C: HttpClient> TokenRefresher for EndpointRefresher<C> {
    async fn refresh(&self, current: Option<&Token>) -> Result<Token, RefreshError> {
        let mut request = RequestSpec::post(self.refresh_url.as_str()).authorized(current);
        if let Some(timeout_ms) = self.timeout_ms {
            request = request.with_timeout_ms(timeout_ms);
        }

        let response = self
            .transport
            .execute(&request)
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        debug!(status = response.status, url = %self.refresh_url, "refresh endpoint answered");

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
            });
        }

        let body: RefreshResponse = response
            .json()
            .map_err(|_| RefreshError::MissingAccessToken)?;
        body.access_token
            .and_then(|value| Token::new(value).ok())
            .ok_or(RefreshError::MissingAccessToken)
    }
}
