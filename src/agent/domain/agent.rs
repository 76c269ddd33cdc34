//! Managed agent aggregate root.

use super::{AgentId, AgentName, DeploymentConfig, EngineConfig, RetrievalConfig};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Validated fields supplied when registering an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDefinition {
    /// Unique display name.
    pub name: AgentName,
    /// Free-text description.
    pub description: Option<String>,
    /// Opaque runtime configuration.
    pub engine_config: EngineConfig,
    /// Source location.
    pub retrieval: RetrievalConfig,
    /// Deployment target.
    pub deployment: DeploymentConfig,
}

/// Partial update applied to an existing agent. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentPatch {
    /// Replacement name.
    pub name: Option<AgentName>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement engine configuration.
    pub engine_config: Option<EngineConfig>,
    /// Replacement source location.
    pub retrieval: Option<RetrievalConfig>,
    /// Replacement deployment target.
    pub deployment: Option<DeploymentConfig>,
}

impl AgentPatch {
    /// Returns whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.engine_config.is_none()
            && self.retrieval.is_none()
            && self.deployment.is_none()
    }
}

/// Managed agent aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedAgent {
    id: AgentId,
    name: AgentName,
    description: Option<String>,
    engine_config: EngineConfig,
    retrieval: RetrievalConfig,
    deployment: DeploymentConfig,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAgentData {
    /// Persisted identifier.
    pub id: AgentId,
    /// Persisted name.
    pub name: AgentName,
    /// Persisted description.
    pub description: Option<String>,
    /// Persisted engine configuration.
    pub engine_config: EngineConfig,
    /// Persisted source location.
    pub retrieval: RetrievalConfig,
    /// Persisted deployment target.
    pub deployment: DeploymentConfig,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ManagedAgent {
    /// Creates a new managed agent.
    #[must_use]
    pub fn new(id: AgentId, definition: AgentDefinition, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        let AgentDefinition {
            name,
            description,
            engine_config,
            retrieval,
            deployment,
        } = definition;
        Self {
            id,
            name,
            description,
            engine_config,
            retrieval,
            deployment,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs an agent from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedAgentData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            description: data.description,
            engine_config: data.engine_config,
            retrieval: data.retrieval,
            deployment: data.deployment,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the agent identifier.
    #[must_use]
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    /// Returns the agent name.
    #[must_use]
    pub const fn name(&self) -> &AgentName {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn engine_config(&self) -> &EngineConfig {
        &self.engine_config
    }

    /// Returns the source location.
    #[must_use]
    pub const fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Returns the deployment target.
    #[must_use]
    pub const fn deployment(&self) -> &DeploymentConfig {
        &self.deployment
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

    /// Applies a partial update. An empty patch leaves the timestamp alone.
    pub fn apply(&mut self, patch: AgentPatch, clock: &impl Clock) {
        if patch.is_empty() {
            return;
        }
        let AgentPatch {
            name,
            description,
            engine_config,
            retrieval,
            deployment,
        } = patch;
        if let Some(value) = name {
            self.name = value;
        }
        if let Some(value) = description {
            self.description = Some(value);
        }
        if let Some(value) = engine_config {
            self.engine_config = value;
        }
        if let Some(value) = retrieval {
            self.retrieval = value;
        }
        if let Some(value) = deployment {
            self.deployment = value;
        }
        self.touch(clock);
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
