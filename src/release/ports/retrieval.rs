//! Source retrieval capability.

use crate::agent::domain::RetrievalConfig;
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Result type for retrieval operations.
pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Fetches agent source into a working directory.
#[async_trait]
pub trait RetrievalCapability: Send + Sync {
    /// Materializes the source described by `source` under `destination`.
    ///
    /// Returns the directory holding the agent, which may be a subdirectory
    /// of `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidInput`] for malformed payloads or
    /// paths, [`RetrievalError::Unavailable`] when a required tool is
    /// missing, or [`RetrievalError::Failed`] when fetching fails.
    async fn retrieve(
        &self,
        source: &RetrievalConfig,
        destination: &Utf8Path,
    ) -> RetrievalResult<Utf8PathBuf>;
}

/// Errors returned by retrieval adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// The source configuration or payload is unusable.
    #[error("invalid source: {0}")]
    InvalidInput(String),

    /// A tool needed for retrieval is not installed.
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),

    /// Fetching or unpacking the source failed.
    #[error("retrieval failed: {0}")]
    Failed(String),
}
