//! Tessera Domain - Core types
//!
//! This crate defines the domain model for the Tessera authenticated HTTP
//! client: credentials, requests and responses, refresh outcomes and the
//! persisted session. All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod request;
pub mod response;
pub mod session;

pub use auth::{BEARER_SCHEME, Identity, RefreshError, RefreshFailure, RefreshState, Token};
pub use error::{DomainError, DomainResult};
pub use session::{SESSION_SCHEMA_VERSION, SessionRecord, SessionStatus};
