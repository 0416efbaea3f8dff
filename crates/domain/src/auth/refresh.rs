//! Token refresh state and outcomes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a refresh call is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// No refresh in flight; the next 401 may start one.
    #[default]
    Idle,
    /// A refresh call is in flight; new callers wait for its outcome.
    Refreshing,
}

impl RefreshState {
    /// Returns true while a refresh call is in flight.
    #[must_use]
    pub const fn is_refreshing(self) -> bool {
        matches!(self, Self::Refreshing)
    }
}

/// Why a refresh attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The refresh endpoint answered with a non-success status.
    #[error("refresh endpoint rejected the session (HTTP {status})")]
    Rejected {
        /// HTTP status returned by the refresh endpoint.
        status: u16,
    },

    /// The refresh endpoint succeeded but returned no usable `access_token`.
    #[error("refresh response did not contain an access_token")]
    MissingAccessToken,

    /// The refresh call never produced a response.
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// The refresh call did not conclude in time.
    #[error("refresh timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured refresh timeout.
        timeout_ms: u64,
    },

    /// The token store could not be read or written.
    #[error("token store error: {0}")]
    Store(String),
}

/// Failure outcome of one refresh attempt, shared by every waiter on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token refresh #{attempt} failed: {cause}")]
pub struct RefreshFailure {
    /// Sequence number of the refresh attempt (starts at 1).
    pub attempt: u64,
    /// What went wrong.
    pub cause: RefreshError,
}

impl RefreshFailure {
    /// Creates a failure for the given attempt.
    #[must_use]
    pub const fn new(attempt: u64, cause: RefreshError) -> Self {
        Self { attempt, cause }
    }
}
