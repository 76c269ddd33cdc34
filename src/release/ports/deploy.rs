//! Deployment capability.

use crate::agent::domain::{DeploymentConfig, DeploymentTarget};
use crate::release::domain::{DeployOutcome, DeployRef, ImageTag, ServiceName};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for deploy operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Runs images as services and tears them down.
#[async_trait]
pub trait DeployCapability: Send + Sync {
    /// Checks that deploying is implemented for the configured target.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Unsupported`] for targets without an
    /// implementation.
    fn ensure_supported(&self, config: &DeploymentConfig) -> DeployResult<()>;

    /// Starts `image` as `service`, replacing any instance already running
    /// under that name.
    ///
    /// Removal of the previous instance is best-effort; its failure is
    /// logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Unsupported`], [`DeployError::Unavailable`], or
    /// [`DeployError::Failed`] when the new instance does not start.
    async fn deploy(
        &self,
        image: &ImageTag,
        service: &ServiceName,
        config: &DeploymentConfig,
    ) -> DeployResult<DeployOutcome>;

    /// Tears down a running instance.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Unsupported`] or [`DeployError::Failed`].
    async fn delete(&self, deploy_ref: &DeployRef, config: &DeploymentConfig) -> DeployResult<()>;
}

/// Errors returned by deploy adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeployError {
    /// The target has no implementation. Retrying will not help.
    #[error("deploying to {0} targets is not supported")]
    Unsupported(DeploymentTarget),

    /// The container runtime is not installed or not reachable.
    #[error("deploy target unavailable: {0}")]
    Unavailable(String),

    /// Starting or stopping the service failed.
    #[error("deploy failed: {0}")]
    Failed(String),
}
