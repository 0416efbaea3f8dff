//! Tessera Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus settings loading and the
//! wiring that assembles a ready-to-use client.

pub mod adapters;
pub mod persistence;
pub mod serialization;
pub mod session;
pub mod settings;

use std::sync::Arc;

use tessera_application::ports::{
    HttpClientError, IdentityStore, SessionNotifier, StoreError, TokenRefresher, TokenStore,
};
use tessera_application::{AuthenticatedClient, EndpointRefresher, RefreshCoordinator, Session};
use thiserror::Error;
use tracing::debug;

pub use adapters::{ReqwestHttpClient, SystemClock};
pub use persistence::FileTokenStore;
pub use serialization::{SerializationError, from_json_bytes, to_json_stable, to_json_stable_bytes};
pub use session::{DEFAULT_ENTRY_ROUTE, WatchSessionNotifier};
pub use settings::{ClientSettings, ENV_PREFIX, SettingsError};

/// Errors that can occur while assembling a [`ClientStack`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The HTTP transport could not be created.
    #[error("could not create HTTP client: {0}")]
    Transport(#[from] HttpClientError),

    /// The session file could not be opened.
    #[error("could not open session store: {0}")]
    Store(#[from] StoreError),

    /// No session file was configured and the platform has no config dir.
    #[error("no session file configured and no config directory available")]
    NoSessionPath,
}

/// Everything a front end needs to make authenticated calls.
#[derive(Debug)]
pub struct ClientStack {
    /// Client that attaches the token and recovers from 401.
    pub client: Arc<AuthenticatedClient<ReqwestHttpClient>>,
    /// Explicit login and logout.
    pub session: Session,
    /// Publishes session teardown.
    pub notifier: Arc<WatchSessionNotifier>,
    /// The backing session file.
    pub store: Arc<FileTokenStore>,
}

/// Builds the client stack described by `settings`.
///
/// One stack owns one refresh coordinator; share the stack, not the
/// settings, to keep refreshes single-flight.
///
/// # Errors
/// Returns an error if the transport cannot be created or the session file
/// cannot be opened.
pub async fn connect(settings: &ClientSettings) -> Result<ClientStack, ConnectError> {
    let transport = Arc::new(ReqwestHttpClient::new()?);
    let path = settings.session_file().ok_or(ConnectError::NoSessionPath)?;
    let store = Arc::new(FileTokenStore::open(path, Arc::new(SystemClock::new())).await?);
    debug!(session_file = %store.path().display(), base_url = %settings.base_url, "connecting");

    let tokens: Arc<dyn TokenStore> = store.clone();
    let identities: Arc<dyn IdentityStore> = store.clone();

    let refresher: Arc<dyn TokenRefresher> = Arc::new(
        EndpointRefresher::new(Arc::clone(&transport), settings.refresh_url())
            .with_timeout_ms(settings.request_timeout_ms),
    );
    let mut coordinator = RefreshCoordinator::new(refresher, Arc::clone(&tokens));
    if let Some(limit) = settings.refresh_timeout() {
        coordinator = coordinator.with_timeout(limit);
    }

    let notifier = Arc::new(WatchSessionNotifier::new(
        Arc::clone(&tokens),
        Arc::clone(&identities),
        settings.entry_route.clone(),
    ));
    let client = AuthenticatedClient::new(
        transport,
        Arc::clone(&tokens),
        Arc::clone(&notifier) as Arc<dyn SessionNotifier>,
        coordinator,
    );

    Ok(ClientStack {
        client: Arc::new(client),
        session: Session::new(tokens, identities),
        notifier,
        store,
    })
}
