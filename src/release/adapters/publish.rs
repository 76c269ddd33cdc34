//! Registry publisher.

use crate::release::domain::{ArtifactUri, ImageTag};
use crate::release::ports::{PublishCapability, PublishError, PublishResult, RegistryKind};
use async_trait::async_trait;
use tracing::debug;

/// Publishes images to the configured registry.
///
/// Only [`RegistryKind::Local`] is implemented: the image already lives in
/// the local engine, so publishing just reports `local://<tag>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryPublisher {
    kind: RegistryKind,
}

impl RegistryPublisher {
    /// Creates a publisher for `kind`.
    #[must_use]
    pub const fn new(kind: RegistryKind) -> Self {
        Self { kind }
    }

    /// Returns the configured registry.
    #[must_use]
    pub const fn kind(&self) -> RegistryKind {
        self.kind
    }
}

#[async_trait]
impl PublishCapability for RegistryPublisher {
    fn ensure_supported(&self) -> PublishResult<()> {
        match self.kind {
            RegistryKind::Local => Ok(()),
            other => Err(PublishError::Unsupported(other)),
        }
    }

    async fn publish(&self, image: &ImageTag) -> PublishResult<ArtifactUri> {
        self.ensure_supported()?;
        debug!(%image, registry = %self.kind, "publishing image");
        Ok(ArtifactUri::new(format!("local://{image}")))
    }
}
