//! Outbound request together with its retry marker.

use super::RequestSpec;

/// Which send of a request this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Attempt {
    /// First send, a 401 may still trigger a refresh.
    #[default]
    Initial,
    /// Re-send after a refresh; a 401 here is final.
    Retry,
}

/// A request that has not finished its authentication round trip yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    request: RequestSpec,
    attempt: Attempt,
}

impl PendingRequest {
    /// Wraps a request for its first send.
    #[must_use]
    pub const fn new(request: RequestSpec) -> Self {
        Self {
            request,
            attempt: Attempt::Initial,
        }
    }

    /// The request as the caller built it.
    #[must_use]
    pub const fn request(&self) -> &RequestSpec {
        &self.request
    }

    /// The current attempt.
    #[must_use]
    pub const fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// Turns an initial attempt into its single retry.
    ///
    /// Returns `None` when this already is the retry.
    #[must_use]
    pub fn into_retry(self) -> Option<Self> {
        match self.attempt {
            Attempt::Initial => Some(Self {
                request: self.request,
                attempt: Attempt::Retry,
            }),
            Attempt::Retry => None,
        }
    }
}
