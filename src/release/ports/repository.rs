//! Repository port for version and deployment persistence.

use crate::agent::domain::AgentId;
use crate::release::domain::{AgentVersion, Deployment, DeploymentId, VersionId, VersionNumber};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for release repository operations.
pub type ReleaseRepositoryResult<T> = Result<T, ReleaseRepositoryError>;

/// Everything written when a deploy or rollback succeeds.
///
/// Implementations apply the whole commit in one transaction: insert the
/// deployment, stop every other running deployment of the agent, store the
/// deployed version, and store the superseded version when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentCommit {
    /// The new running deployment.
    pub deployment: Deployment,
    /// The deployed version, already moved to `Deployed`.
    pub version: AgentVersion,
    /// The previously running version, already moved to `RolledBack`.
    pub superseded: Option<AgentVersion>,
}

/// Version and deployment persistence contract.
#[async_trait]
pub trait ReleaseRepository: Send + Sync {
    /// Reserves the next version number for an agent.
    ///
    /// The returned number is strictly greater than every number previously
    /// returned for the same agent, including under concurrent callers, and
    /// is never handed out again even if no version row is ever written.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseRepositoryError::AgentNotFound`] when the agent does
    /// not exist.
    async fn allocate_next_version(&self, agent_id: &AgentId)
    -> ReleaseRepositoryResult<VersionNumber>;

    /// Stores a published version and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseRepositoryError::VersionConflict`] when the agent
    /// already has a row with the same number,
    /// [`ReleaseRepositoryError::IncompleteVersion`] when the version has no
    /// artifact, or [`ReleaseRepositoryError::AgentNotFound`] when the agent
    /// is gone.
    async fn insert_version(&self, version: &AgentVersion) -> ReleaseRepositoryResult<VersionId>;

    /// Persists status, artifact, and deployment reference of a version.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseRepositoryError::VersionNotFound`] when no row exists.
    async fn update_version(&self, version: &AgentVersion) -> ReleaseRepositoryResult<()>;

    /// Finds a version by agent and number.
    async fn find_version(
        &self,
        agent_id: &AgentId,
        version: VersionNumber,
    ) -> ReleaseRepositoryResult<Option<AgentVersion>>;

    /// Finds a version by identifier.
    async fn find_version_by_id(&self, id: VersionId)
    -> ReleaseRepositoryResult<Option<AgentVersion>>;

    /// Returns all versions of an agent, highest number first.
    async fn list_versions(&self, agent_id: &AgentId) -> ReleaseRepositoryResult<Vec<AgentVersion>>;

    /// Returns the running deployment of an agent, if any.
    async fn find_running_deployment(
        &self,
        agent_id: &AgentId,
    ) -> ReleaseRepositoryResult<Option<Deployment>>;

    /// Returns all deployments of an agent, newest first.
    async fn list_deployments(&self, agent_id: &AgentId) -> ReleaseRepositoryResult<Vec<Deployment>>;

    /// Persists the status of an existing deployment.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseRepositoryError::DeploymentNotFound`] when no row
    /// exists.
    async fn update_deployment(&self, deployment: &Deployment) -> ReleaseRepositoryResult<()>;

    /// Applies a [`DeploymentCommit`] atomically.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseRepositoryError::VersionNotFound`] when a referenced
    /// version row does not exist; nothing is written in that case.
    async fn record_deployment(&self, commit: &DeploymentCommit) -> ReleaseRepositoryResult<()>;
}

/// Errors returned by release repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ReleaseRepositoryError {
    /// The agent does not exist.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The version row does not exist.
    #[error("version not found: {0}")]
    VersionNotFound(VersionId),

    /// The deployment row does not exist.
    #[error("deployment not found: {0}")]
    DeploymentNotFound(DeploymentId),

    /// Another row already holds this agent and version number.
    #[error("version {version} already exists for agent {agent_id}")]
    VersionConflict {
        /// Owning agent.
        agent_id: AgentId,
        /// Conflicting number.
        version: VersionNumber,
    },

    /// The version has not been published and cannot be stored.
    #[error("version {0} has no published artifact")]
    IncompleteVersion(VersionNumber),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ReleaseRepositoryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
