//! Deployment records: one per deploy or rollback.

use super::{
    AgentVersion, DeployRef, ParseDeploymentStatusError, ReleaseDomainError, VersionId,
};
use crate::agent::domain::{AgentId, DeploymentTarget};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a deployment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(Uuid);

impl DeploymentId {
    /// Creates a new random deployment identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deployment identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a deployment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// The most recent deployment of its agent.
    Running,
    /// Superseded by a later deployment or torn down.
    Stopped,
}

impl DeploymentStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DeploymentStatus {
    type Error = ParseDeploymentStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            _ => Err(ParseDeploymentStatusError(value.to_owned())),
        }
    }
}

/// What a deploy capability reports back for a started service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    /// Public URL of the running service.
    pub endpoint_url: String,
    /// Handle used to tear the instance down.
    pub deploy_ref: DeployRef,
    /// Router entry created for the service, when the target routes by name.
    pub router_id: Option<String>,
}

/// One running instantiation of an agent version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    id: DeploymentId,
    agent_id: AgentId,
    version_id: VersionId,
    target: DeploymentTarget,
    endpoint_url: String,
    router_id: Option<String>,
    deploy_ref: DeployRef,
    status: DeploymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedDeploymentData {
    /// Persisted identifier.
    pub id: DeploymentId,
    /// Owning agent.
    pub agent_id: AgentId,
    /// Deployed version.
    pub version_id: VersionId,
    /// Persisted target kind.
    pub target: DeploymentTarget,
    /// Persisted endpoint.
    pub endpoint_url: String,
    /// Persisted router entry.
    pub router_id: Option<String>,
    /// Persisted teardown handle.
    pub deploy_ref: DeployRef,
    /// Persisted status.
    pub status: DeploymentStatus,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// Creates a `Running` deployment of `version` on `target`.
    #[must_use]
    pub fn new(
        version: &AgentVersion,
        target: DeploymentTarget,
        outcome: DeployOutcome,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        let DeployOutcome {
            endpoint_url,
            deploy_ref,
            router_id,
        } = outcome;
        Self {
            id: DeploymentId::new(),
            agent_id: version.agent_id().clone(),
            version_id: version.id(),
            target,
            endpoint_url,
            router_id,
            deploy_ref,
            status: DeploymentStatus::Running,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a deployment from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedDeploymentData) -> Self {
        Self {
            id: data.id,
            agent_id: data.agent_id,
            version_id: data.version_id,
            target: data.target,
            endpoint_url: data.endpoint_url,
            router_id: data.router_id,
            deploy_ref: data.deploy_ref,
            status: data.status,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the deployment identifier.
    #[must_use]
    pub const fn id(&self) -> DeploymentId {
        self.id
    }

    /// Returns the owning agent.
    #[must_use]
    pub const fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the deployed version.
    #[must_use]
    pub const fn version_id(&self) -> VersionId {
        self.version_id
    }

    /// Returns the target kind.
    #[must_use]
    pub const fn target(&self) -> DeploymentTarget {
        self.target
    }

    /// Returns the public endpoint.
    #[must_use]
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Returns the router entry, if any.
    #[must_use]
    pub fn router_id(&self) -> Option<&str> {
        self.router_id.as_deref()
    }

    /// Returns the teardown handle.
    #[must_use]
    pub const fn deploy_ref(&self) -> &DeployRef {
        &self.deploy_ref
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> DeploymentStatus {
        self.status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Stops this deployment because `successor` replaced it.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidDeploymentTransition`] when the
    /// deployment is already stopped.
    pub fn mark_superseded_by(&mut self, successor: &Self) -> Result<(), ReleaseDomainError> {
        self.stop_at(successor.created_at)
    }

    /// Stops this deployment because its instance is gone, for example when
    /// a failed deploy already removed it.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidDeploymentTransition`] when the
    /// deployment is already stopped.
    pub fn mark_stopped(&mut self, clock: &impl Clock) -> Result<(), ReleaseDomainError> {
        self.stop_at(clock.utc())
    }

    fn stop_at(&mut self, timestamp: DateTime<Utc>) -> Result<(), ReleaseDomainError> {
        if self.status != DeploymentStatus::Running {
            return Err(ReleaseDomainError::InvalidDeploymentTransition {
                from: self.status.as_str().to_owned(),
                to: DeploymentStatus::Stopped.as_str().to_owned(),
            });
        }
        self.status = DeploymentStatus::Stopped;
        self.updated_at = timestamp;
        Ok(())
    }
}
