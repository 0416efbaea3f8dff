//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod clock;
mod http_client;
mod session_notifier;
mod token_refresher;
mod token_store;

pub use clock::Clock;
pub use http_client::{HttpClient, HttpClientError};
pub use session_notifier::SessionNotifier;
pub use token_refresher::TokenRefresher;
pub use token_store::{IdentityStore, StoreError, TokenStore};
