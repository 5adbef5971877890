//! Error types for ndafetch core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can stop a fetch run.
///
/// Per-file transfer failures are not represented here; they are recorded
/// on the batch and in the download history instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Authentication rejected by package API (status {status})")]
    Auth { status: u16 },

    #[error("Manifest error ({path}): {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Failed to resolve package files: {0}")]
    Resolution(String),

    #[error("Failed to generate presigned URLs: {0}")]
    Presign(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gave up after {iterations} iteration(s) with files still missing")]
    RetriesExhausted { iterations: u32 },
}

impl FetchError {
    pub(crate) fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        FetchError::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error comes from the network rather than the request.
    ///
    /// Such a failure may succeed on a later run; everything else needs
    /// operator attention first.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(e) if e.is_connect() || e.is_timeout())
    }
}

impl From<toml::de::Error> for FetchError {
    fn from(error: toml::de::Error) -> Self {
        FetchError::Config(error.to_string())
    }
}
