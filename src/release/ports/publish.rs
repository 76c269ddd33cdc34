//! Image publishing capability.

use crate::release::domain::{ArtifactUri, ImageTag};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Registry an image is published to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    /// Images stay in the local engine.
    #[default]
    Local,
    /// Google Container Registry.
    Gcr,
    /// GitHub Container Registry.
    Ghcr,
    /// Amazon Elastic Container Registry.
    Ecr,
}

impl RegistryKind {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Gcr => "gcr",
            Self::Ghcr => "ghcr",
            Self::Ecr => "ecr",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes built images and reports where they live.
#[async_trait]
pub trait PublishCapability: Send + Sync {
    /// Checks that publishing is implemented for the configured registry.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Unsupported`] for registries without an
    /// implementation.
    fn ensure_supported(&self) -> PublishResult<()>;

    /// Publishes an image and returns its artifact locator.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Unsupported`] or [`PublishError::Failed`].
    async fn publish(&self, image: &ImageTag) -> PublishResult<ArtifactUri>;
}

/// Errors returned by publish adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// The registry has no implementation. Retrying will not help.
    #[error("publishing to {0} registries is not supported")]
    Unsupported(RegistryKind),

    /// Publishing failed.
    #[error("publish failed: {0}")]
    Failed(String),
}
