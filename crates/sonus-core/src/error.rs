//! Error types for the sonus crates.

use thiserror::Error;

/// Error type shared by every sonus subsystem.
///
/// `InvalidInput` is always a caller bug and is never retried.
/// `UnsupportedFormat` signals that an optional backend could not be set up;
/// callers may fall back to the native implementation.
/// `Processing` wraps unexpected failures inside a feature computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedFormat(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Error::Processing(msg.into())
    }

    /// Whether this error is a caller bug (bad size, channel count, threshold).
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
