//! Image build port.

use crate::release::domain::ImageTag;
use async_trait::async_trait;
use camino::Utf8Path;
use thiserror::Error;

/// Result type for image build operations.
pub type ImageBuildResult<T> = Result<T, ImageBuildError>;

/// Turns a prepared working directory into a container image.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Builds the directory's descriptor and tags the image.
    ///
    /// Returns the reference later stages use to publish and deploy.
    ///
    /// # Errors
    ///
    /// Returns [`ImageBuildError::Failed`] when the build fails or
    /// [`ImageBuildError::Unavailable`] when no build engine is reachable.
    async fn build(&self, context_dir: &Utf8Path, tag: &ImageTag) -> ImageBuildResult<ImageTag>;

    /// Removes a built image so it cannot be deployed by accident.
    ///
    /// # Errors
    ///
    /// Returns [`ImageBuildError::Failed`] when removal fails.
    async fn discard(&self, image: &ImageTag) -> ImageBuildResult<()>;
}

/// Errors returned by image builders.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageBuildError {
    /// The build engine is not installed or not reachable.
    #[error("image builder unavailable: {0}")]
    Unavailable(String),

    /// The build itself failed.
    #[error("image build failed: {0}")]
    Failed(String),
}
