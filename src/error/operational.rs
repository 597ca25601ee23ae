//! Operational error context propagation with `anyhow`.
//!
//! Best-effort work (snapshot writes, library polls) never fails the caller.
//! These helpers attach context and route the failure to the log instead.

use std::{error::Error as StdError, fmt::Display};

use {
    anyhow::{Context, Error, Result as AnyhowResult},
    tracing::{debug, error, warn},
};

/// Extension trait for attaching context to fallible operations.
pub trait ResultExt<T, E> {
    /// Adds context to an error with a static string.
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;

    /// Logs the error as a warning with `context` and discards it.
    ///
    /// Returns the success value, if any.
    fn or_warn(self, context: impl Display) -> Option<T>
    where
        E: StdError + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(context)
    }

    fn or_warn(self, context: impl Display) -> Option<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                ErrorReporter::warn(&Error::new(e), &context.to_string());
                None
            }
        }
    }
}

/// Centralized error logging.
pub struct ErrorReporter;

impl ErrorReporter {
    /// Reports a failure that is expected during normal operation.
    pub fn debug(error: &Error, context: &str) {
        debug!(context = context, error = %error, "Ignored failure");
    }

    /// Reports a recoverable failure.
    pub fn warn(error: &Error, context: &str) {
        warn!(context = context, error = %error, "Recoverable failure");
    }

    /// Reports a failure that stops a component.
    pub fn error(error: &Error, context: &str) {
        error!(context = context, error = %error, "Component failure");
    }

    /// Flattens the error chain into one line, outermost context first.
    pub fn to_user_message(error: &Error) -> String {
        error
            .chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ")
    }
}
