use std::path::PathBuf;

use thiserror::Error;

/// Failure surfaced by the backend collaborator.
///
/// The scheduler only cares that a fetch failed; the capability fetcher
/// additionally branches on the HTTP status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("The operation failed with error code {status}: {message}")]
    Http { status: u16, message: String },

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    Timeout(String),
}

impl ApiError {
    /// HTTP status code, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{name} must be greater than zero")]
    ZeroDelay { name: &'static str },

    #[error("delays must be strictly increasing: soon ({soon_ms}ms) < cooldown ({cooldown_ms}ms) < initial resync ({resync_ms}ms)")]
    DelayOrdering {
        soon_ms: u128,
        cooldown_ms: u128,
        resync_ms: u128,
    },
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}
