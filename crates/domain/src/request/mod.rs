//! HTTP request domain types

mod body;
mod header;
mod method;
mod pending;
mod spec;

pub use body::RequestBody;
pub use header::{AUTHORIZATION, Header, Headers};
pub use method::HttpMethod;
pub use pending::{Attempt, PendingRequest};
pub use spec::{DEFAULT_TIMEOUT_MS, RequestSpec};
