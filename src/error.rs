//! Error types and result type for the sword-module crate.
//!
//! This module defines all error variants that can occur when opening or reading
//! SWORD modules. It uses the `snafu` library for ergonomic error handling with
//! automatic backtrace capture.
//!
//! # Examples
//!
//! ```
//! use sword_module::{Result, ModuleError};
//!
//! fn open_module() -> Result<String> {
//!     Err(ModuleError::configuration("neither ot nor nt data is present"))
//! }
//!
//! match open_module() {
//!     Ok(text) => println!("Success: {}", text),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! # Error Variants
//!
//! - [`ModuleError::Configuration`]: the module's files are missing or unusable
//! - [`ModuleError::ReadFailure`]: a single lookup could not locate or decode its bytes
//! - [`ModuleError::ReadOnly`]: a write was attempted on a read-only backend
//! - [`ModuleError::Unsupported`]: the backend does not implement the operation
//! - [`ModuleError::Io`]: I/O errors from file operations
//! - [`ModuleError::InvalidDataFormat`]: malformed module data
//! - [`ModuleError::CompressionError`]: block decompression failures
//!
//! Corruption that can be tolerated (negative sizes, truncated regions, stray
//! control characters) is never returned as an error. It is logged and the
//! affected read degrades to an empty or clamped result.

use std::io;
use snafu::{Snafu, Backtrace};

// Re-export snafu for context providers
pub use snafu;

/// Main error type for the sword-module crate.
///
/// All errors include automatic backtrace capture for debugging purposes.
/// Use the helper methods on `ModuleError` for convenient error construction.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ModuleError {
    /// I/O error occurred during file operations.
    #[snafu(display("IO error: {source}"))]
    Io {
        source: io::Error,
        backtrace: Backtrace,
    },

    /// The module cannot be constructed from its configuration and files.
    #[snafu(display("Configuration error: {message}"))]
    Configuration {
        message: String,
        backtrace: Backtrace,
    },

    /// Bytes for a key could not be located or decoded.
    ///
    /// The backend stays usable after this error.
    #[snafu(display("Read failure for '{key}': {message}"))]
    ReadFailure {
        key: String,
        message: String,
        backtrace: Backtrace,
    },

    /// A write was attempted on a read-only backend.
    #[snafu(display("Module is read-only: {operation}"))]
    ReadOnly {
        operation: String,
        backtrace: Backtrace,
    },

    /// The backend or format combination does not implement the operation.
    #[snafu(display("Unsupported operation: {message}"))]
    Unsupported {
        message: String,
        backtrace: Backtrace,
    },

    /// Error parsing JSON, regular expressions or other structured input.
    #[snafu(display("Parser error: {source}"))]
    ParserError {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        backtrace: Backtrace,
    },

    /// Module data is malformed or doesn't match the expected layout.
    #[snafu(display("Invalid data format: {message}"))]
    InvalidDataFormat {
        message: String,
        backtrace: Backtrace,
    },

    /// Function was called with invalid parameters.
    #[snafu(display("Invalid parameter: {message}"))]
    InvalidParameter {
        message: String,
        backtrace: Backtrace,
    },

    /// Error during compression or decompression operations.
    #[snafu(display("Compression error: {message}"))]
    CompressionError {
        message: String,
        backtrace: Backtrace,
    },
}

impl From<io::Error> for ModuleError {
    fn from(source: io::Error) -> Self {
        Self::Io { source, backtrace: Backtrace::capture() }
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(source: serde_json::Error) -> Self {
        Self::ParserError {
            source: Box::new(source),
            backtrace: Backtrace::capture(),
        }
    }
}

impl From<regex::Error> for ModuleError {
    fn from(source: regex::Error) -> Self {
        Self::ParserError {
            source: Box::new(source),
            backtrace: Backtrace::capture(),
        }
    }
}

/// Helper methods for creating errors without context providers.
impl ModuleError {
    /// Creates a `Configuration` error with the given message.
    ///
    /// # Examples
    ///
    /// ```
    /// use sword_module::ModuleError;
    ///
    /// let error = ModuleError::configuration("missing data path");
    /// assert!(error.to_string().contains("missing data path"));
    /// ```
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `ReadFailure` error for the given key.
    pub fn read_failure<K: Into<String>, S: Into<String>>(key: K, message: S) -> Self {
        Self::ReadFailure {
            key: key.into(),
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `ReadOnly` error naming the rejected operation.
    pub fn read_only<S: Into<String>>(operation: S) -> Self {
        Self::ReadOnly {
            operation: operation.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates an `Unsupported` error with the given message.
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::Unsupported {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates an `InvalidParameter` error with the given message.
    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates an `InvalidDataFormat` error with the given message.
    pub fn invalid_data_format<S: Into<String>>(message: S) -> Self {
        Self::InvalidDataFormat {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `CompressionError` with the given message.
    pub fn compression_error<S: Into<String>>(message: S) -> Self {
        Self::CompressionError {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `CompressionError` for decompression failures.
    pub fn decompression_error<S: Into<String>>(message: S) -> Self {
        Self::CompressionError {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Rewraps any lookup error as a `ReadFailure` for `key`.
    ///
    /// `ReadFailure`, `ReadOnly` and `Unsupported` pass through unchanged.
    pub fn into_read_failure<K: Into<String>>(self, key: K) -> Self {
        match self {
            ModuleError::ReadFailure { .. }
            | ModuleError::ReadOnly { .. }
            | ModuleError::Unsupported { .. } => self,
            other => ModuleError::read_failure(key, other.to_string()),
        }
    }

    /// Checks if this error is a `ReadFailure` variant.
    pub fn is_read_failure(&self) -> bool {
        matches!(self, ModuleError::ReadFailure { .. })
    }
}

/// A specialized `Result` type for module operations.
///
/// This is a convenience type alias that uses [`ModuleError`] as the error type.
pub type Result<T> = std::result::Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_read_failure_wraps_io() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let err = ModuleError::from(io_err).into_read_failure("Gen.1.1");
        match err {
            ModuleError::ReadFailure { key, message, .. } => {
                assert_eq!(key, "Gen.1.1");
                assert!(message.contains("short read"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_into_read_failure_keeps_read_only() {
        let err = ModuleError::read_only("set_raw_text").into_read_failure("Gen.1.1");
        assert!(matches!(err, ModuleError::ReadOnly { .. }));
    }
}
