//! Error types for Markfold.
//!
//! Library crates use [`MarkfoldError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Markfold operations.
#[derive(Debug, thiserror::Error)]
pub enum MarkfoldError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A required classifier setting (API key or base URL) is absent.
    #[error(
        "{0} is not set. Configure it in ~/.markfold/markfold.toml or the environment."
    )]
    ConfigurationMissing(String),

    /// Network/HTTP transport error.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or response parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Folder store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Page content extraction error.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// The classifier answered with a non-success status.
    #[error("API call failed with status {status}: {body}")]
    ClassificationHttp { status: u16, body: String },

    /// The classifier answered without usable text.
    #[error("classifier did not return a valid category")]
    ClassificationEmpty,

    /// Resolving or creating a category folder failed.
    #[error("folder resolution failed: {0}")]
    FolderResolution(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Rejected input; the message is shown to the user as is.
    #[error("{message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MarkfoldError>;

impl MarkfoldError {
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
