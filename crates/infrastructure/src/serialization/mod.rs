//! Deterministic JSON serialization for the session file.
//!
//! Keeps the file stable between writes:
//! - Fields in declaration order
//! - 2-space indentation
//! - Trailing newline

mod json;

pub use json::*;
