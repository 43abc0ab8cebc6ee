//! Error types for Pagecraft.
//!
//! Library crates use [`PagecraftError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Pagecraft operations.
#[derive(Debug, thiserror::Error)]
pub enum PagecraftError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Content could not be parsed (front matter, dates, HTML).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Content-authoring validation error (section markers, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Rendered HTML contains markup outside the allow-list.
    #[error("sanitize error: {0}")]
    Sanitize(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagecraftError>;

impl PagecraftError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
