//! Bearer-token authentication for outbound requests.
//!
//! This module provides:
//! - `AuthenticatedClient`, which attaches the stored token and retries once
//!   after a 401
//! - `RefreshCoordinator`, which collapses concurrent refreshes into one
//! - `EndpointRefresher`, the refresh call against the backend
//! - `MemoryTokenStore`, an in-process token and identity store

mod client;
mod coordinator;
mod memory_store;
mod refresher;

pub use client::AuthenticatedClient;
pub use coordinator::{RefreshCoordinator, RefreshTicket};
pub use memory_store::MemoryTokenStore;
pub use refresher::EndpointRefresher;
