//! Error handling using `thiserror` and `anyhow`.
//!
//! Domain-specific error types for precise handling, plus operational
//! helpers for best-effort work whose failures are only logged.

pub mod domain;
pub mod operational;

pub use {
    domain::{LibraryError, PersistenceError, PlaybackError},
    operational::{ErrorReporter, ResultExt},
};
