//! Error types for omx.

use std::path::PathBuf;

/// Top-level error type for the server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("MCP transport error: {0}")]
    Mcp(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Job orchestration errors.
///
/// These surface to MCP callers as tool errors and never reach [`Error`].
/// Spawn failures and non-zero exits are not errors: they land in the job's
/// `failed` state and are reported through the status snapshot.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("No job \"{id}\". It never existed or has been evicted.")]
    NotFound { id: String },

    #[error("{0}")]
    InvalidRequest(String),
}

/// Persistent document store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid {key}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for omx.
pub type Result<T> = std::result::Result<T, Error>;
