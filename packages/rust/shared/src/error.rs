//! Error types for Proposalgen.
//!
//! Library crates use [`ProposalError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Stage-level failures (model errors, tool errors, validation violations) are
//! not errors in this sense: they end up as a structured
//! [`FailureReason`](crate::FailureReason) on the Run.

use std::path::PathBuf;

/// Top-level error type for Proposalgen operations outside the stage loop.
#[derive(Debug, thiserror::Error)]
pub enum ProposalError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input or data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The shared context did not hold what the assembler needs.
    #[error("assembly error: {0}")]
    Assembly(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProposalError>;

impl ProposalError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

impl From<serde_json::Error> for ProposalError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
