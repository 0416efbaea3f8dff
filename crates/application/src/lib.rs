//! Tessera Application - Use cases and ports
//!
//! This crate contains the authenticated request pipeline and defines the
//! ports (interfaces) that infrastructure adapters must implement.
//!
//! The pipeline attaches the stored bearer token to every request. When the
//! backend answers 401 it refreshes the token once for all concurrent
//! requests, retries each of them a single time, and ends the session if the
//! refresh itself fails.

pub mod auth;
pub mod error;
pub mod ports;
pub mod use_cases;

pub use auth::{AuthenticatedClient, EndpointRefresher, MemoryTokenStore, RefreshCoordinator, RefreshTicket};
pub use error::{ClientError, ClientResult};
pub use use_cases::Session;
