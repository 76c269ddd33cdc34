//! Agent version aggregate and its lifecycle.

use super::{
    ArtifactUri, DeployRef, ImageTag, ParseVersionStatusError, ReleaseDomainError,
};
use crate::agent::domain::{AgentId, DeploymentTarget};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a persisted agent version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(Uuid);

impl VersionId {
    /// Creates a new random version identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a version identifier from an existing UUID.
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

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-agent version number. Starts at one and is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionNumber(u32);

impl VersionNumber {
    /// The first version of every agent.
    pub const FIRST: Self = Self(1);

    /// Creates a validated version number.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidVersionNumber`] for zero.
    pub fn new(value: u32) -> Result<Self, ReleaseDomainError> {
        if value == 0 {
            return Err(ReleaseDomainError::InvalidVersionNumber(0));
        }
        Ok(Self(value))
    }

    /// Creates a version number from a signed storage value.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidVersionNumber`] when the value is
    /// not a positive 32-bit integer.
    pub fn from_storage(value: i64) -> Result<Self, ReleaseDomainError> {
        u32::try_from(value)
            .ok()
            .filter(|number| *number > 0)
            .map(Self)
            .ok_or(ReleaseDomainError::InvalidVersionNumber(value))
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an agent version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// Allocated and being built; never persisted in this state.
    Created,
    /// Image built and published.
    Built,
    /// Image is, or was last asserted to be, deployed.
    Deployed,
    /// The pipeline failed after the version was recorded.
    Failed,
    /// Superseded by a rollback to an earlier version.
    RolledBack,
}

impl VersionStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Built => "built",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Returns whether transition to `target` is allowed.
    ///
    /// `deployed → deployed` is allowed so a rollback can re-assert the
    /// current version.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Built | Self::Failed)
                | (Self::Built, Self::Deployed | Self::Failed)
                | (Self::Deployed, Self::Deployed | Self::RolledBack)
                | (Self::RolledBack, Self::Deployed)
        )
    }

    /// Returns whether a version in this status holds a reusable image.
    #[must_use]
    pub const fn is_redeployable(self) -> bool {
        matches!(self, Self::Built | Self::Deployed | Self::RolledBack)
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for VersionStatus {
    type Error = ParseVersionStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "created" => Ok(Self::Created),
            "built" => Ok(Self::Built),
            "deployed" => Ok(Self::Deployed),
            "failed" => Ok(Self::Failed),
            "rolled_back" => Ok(Self::RolledBack),
            _ => Err(ParseVersionStatusError(value.to_owned())),
        }
    }
}

/// One built-and-recorded artifact of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentVersion {
    id: VersionId,
    agent_id: AgentId,
    version: VersionNumber,
    image_tag: ImageTag,
    artifact_uri: Option<ArtifactUri>,
    deploy_target: DeploymentTarget,
    deploy_ref: Option<DeployRef>,
    status: VersionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedVersionData {
    /// Persisted identifier.
    pub id: VersionId,
    /// Owning agent.
    pub agent_id: AgentId,
    /// Persisted version number.
    pub version: VersionNumber,
    /// Persisted image tag.
    pub image_tag: ImageTag,
    /// Persisted artifact locator.
    pub artifact_uri: Option<ArtifactUri>,
    /// Persisted deployment target.
    pub deploy_target: DeploymentTarget,
    /// Persisted deployment reference.
    pub deploy_ref: Option<DeployRef>,
    /// Persisted status.
    pub status: VersionStatus,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl AgentVersion {
    /// Creates an in-memory version in `Created` status.
    #[must_use]
    pub fn new(
        agent_id: AgentId,
        version: VersionNumber,
        image_tag: ImageTag,
        deploy_target: DeploymentTarget,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: VersionId::new(),
            agent_id,
            version,
            image_tag,
            artifact_uri: None,
            deploy_target,
            deploy_ref: None,
            status: VersionStatus::Created,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a version from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedVersionData) -> Self {
        Self {
            id: data.id,
            agent_id: data.agent_id,
            version: data.version,
            image_tag: data.image_tag,
            artifact_uri: data.artifact_uri,
            deploy_target: data.deploy_target,
            deploy_ref: data.deploy_ref,
            status: data.status,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the version identifier.
    #[must_use]
    pub const fn id(&self) -> VersionId {
        self.id
    }

    /// Returns the owning agent.
    #[must_use]
    pub const fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the version number.
    #[must_use]
    pub const fn version(&self) -> VersionNumber {
        self.version
    }

    /// Returns the image tag.
    #[must_use]
    pub const fn image_tag(&self) -> &ImageTag {
        &self.image_tag
    }

    /// Returns the artifact locator, set once the image is published.
    #[must_use]
    pub const fn artifact_uri(&self) -> Option<&ArtifactUri> {
        self.artifact_uri.as_ref()
    }

    /// Returns the deployment target recorded at build time.
    #[must_use]
    pub const fn deploy_target(&self) -> DeploymentTarget {
        self.deploy_target
    }

    /// Returns the reference of the last successful deploy.
    #[must_use]
    pub const fn deploy_ref(&self) -> Option<&DeployRef> {
        self.deploy_ref.as_ref()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> VersionStatus {
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

    /// Records the published artifact and moves to `Built`.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidVersionTransition`] unless the
    /// version is `Created`.
    pub fn mark_built(
        &mut self,
        artifact_uri: ArtifactUri,
        clock: &impl Clock,
    ) -> Result<(), ReleaseDomainError> {
        self.transition_to(VersionStatus::Built)?;
        self.artifact_uri = Some(artifact_uri);
        self.touch(clock);
        Ok(())
    }

    /// Records a successful deploy, setting the reference and status
    /// together.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidVersionTransition`] when the
    /// version holds no deployable image.
    pub fn mark_deployed(
        &mut self,
        deploy_ref: DeployRef,
        clock: &impl Clock,
    ) -> Result<(), ReleaseDomainError> {
        self.transition_to(VersionStatus::Deployed)?;
        self.deploy_ref = Some(deploy_ref);
        self.touch(clock);
        Ok(())
    }

    /// Marks the version as failed.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidVersionTransition`] once the
    /// version has been deployed.
    pub fn mark_failed(&mut self, clock: &impl Clock) -> Result<(), ReleaseDomainError> {
        self.transition_to(VersionStatus::Failed)?;
        self.touch(clock);
        Ok(())
    }

    /// Marks the version as superseded by a rollback.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidVersionTransition`] unless the
    /// version is `Deployed`.
    pub fn mark_rolled_back(&mut self, clock: &impl Clock) -> Result<(), ReleaseDomainError> {
        self.transition_to(VersionStatus::RolledBack)?;
        self.touch(clock);
        Ok(())
    }

    /// Validates that this version can be redeployed by a rollback.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidVersionTransition`] when the
    /// version never produced a usable image.
    pub fn ensure_redeployable(&self) -> Result<(), ReleaseDomainError> {
        if self.status.is_redeployable() {
            return Ok(());
        }
        Err(ReleaseDomainError::InvalidVersionTransition {
            from: self.status.as_str().to_owned(),
            to: VersionStatus::Deployed.as_str().to_owned(),
        })
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }

    fn transition_to(&mut self, target: VersionStatus) -> Result<(), ReleaseDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(ReleaseDomainError::InvalidVersionTransition {
                from: self.status.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }
        self.status = target;
        Ok(())
    }
}
