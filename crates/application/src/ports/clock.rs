//! Clock port

use chrono::{DateTime, Utc};

/// Source of the current time, used to stamp persisted session records.
///
/// Swapped for a fixed clock in tests so written documents are predictable.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}
