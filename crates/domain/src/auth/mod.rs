//! Authentication domain types

mod identity;
mod refresh;
mod token;

pub use identity::Identity;
pub use refresh::{RefreshError, RefreshFailure, RefreshState};
pub use token::{BEARER_SCHEME, Token};
