//! Managed agent registration service.
//!
//! Provides [`AgentRegistryService`] which validates incoming agent payloads
//! and coordinates create, read, update, and delete operations against an
//! [`AgentRepository`].

use crate::agent::{
    domain::{
        AgentDefinition, AgentDomainError, AgentId, AgentName, AgentPatch, DeploymentConfig,
        EngineConfig, ManagedAgent, RetrievalConfig,
    },
    ports::{AgentRepository, AgentRepositoryError},
};
use mockable::Clock;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Request payload for registering a managed agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateAgentRequest {
    /// Caller-chosen identifier; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Unique display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Engine configuration object passed to the agent runtime.
    #[serde(default = "empty_object")]
    pub engine_config: Value,
    /// Source location.
    pub retrieval: RetrievalConfig,
    /// Deployment target, local by default.
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl CreateAgentRequest {
    /// Creates a request with an empty engine configuration and a local
    /// deployment target.
    #[must_use]
    pub fn new(name: impl Into<String>, retrieval: RetrievalConfig) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            engine_config: empty_object(),
            retrieval,
            deployment: DeploymentConfig::local(),
        }
    }

    /// Sets a caller-chosen identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_engine_config(mut self, engine_config: Value) -> Self {
        self.engine_config = engine_config;
        self
    }

    /// Sets the deployment target.
    #[must_use]
    pub fn with_deployment(mut self, deployment: DeploymentConfig) -> Self {
        self.deployment = deployment;
        self
    }
}

/// Request payload for a partial agent update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdateAgentRequest {
    /// Replacement name.
    #[serde(default)]
    pub name: Option<String>,
    /// Replacement description.
    #[serde(default)]
    pub description: Option<String>,
    /// Replacement engine configuration.
    #[serde(default)]
    pub engine_config: Option<Value>,
    /// Replacement source location.
    #[serde(default)]
    pub retrieval: Option<RetrievalConfig>,
    /// Replacement deployment target.
    #[serde(default)]
    pub deployment: Option<DeploymentConfig>,
}

/// Service-level errors for agent registration.
#[derive(Debug, Error)]
pub enum AgentRegistryServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] AgentDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] AgentRepositoryError),
}

/// Result type for agent registry service operations.
pub type AgentRegistryServiceResult<T> = Result<T, AgentRegistryServiceError>;

/// Managed agent registration service.
#[derive(Clone)]
pub struct AgentRegistryService<R, C>
where
    R: AgentRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> AgentRegistryService<R, C>
where
    R: AgentRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new agent registry service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Registers a new managed agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRegistryServiceError::Domain`] when any field fails
    /// validation, or [`AgentRegistryServiceError::Repository`] when the
    /// identifier or name is already taken or persistence fails.
    pub async fn create(
        &self,
        request: CreateAgentRequest,
    ) -> AgentRegistryServiceResult<ManagedAgent> {
        let CreateAgentRequest {
            id,
            name,
            description,
            engine_config,
            retrieval,
            deployment,
        } = request;

        let agent_id = id.map_or_else(|| Ok(AgentId::generate()), AgentId::new)?;
        retrieval.validate()?;
        let definition = AgentDefinition {
            name: AgentName::new(name)?,
            description,
            engine_config: EngineConfig::new(engine_config)?,
            retrieval,
            deployment,
        };

        let agent = ManagedAgent::new(agent_id, definition, &*self.clock);
        self.repository.create(&agent).await?;
        info!(agent_id = %agent.id(), name = %agent.name(), "registered managed agent");
        Ok(agent)
    }

    /// Returns an agent by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRepositoryError::NotFound`] (wrapped) when the agent
    /// does not exist, or other repository errors.
    pub async fn get(&self, id: &AgentId) -> AgentRegistryServiceResult<ManagedAgent> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AgentRepositoryError::NotFound(id.clone()).into())
    }

    /// Returns all agents, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRegistryServiceError::Repository`] when persistence
    /// lookup fails.
    pub async fn list(&self) -> AgentRegistryServiceResult<Vec<ManagedAgent>> {
        Ok(self.repository.list_all().await?)
    }

    /// Applies a partial update to an agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRegistryServiceError::Domain`] when a supplied field
    /// fails validation, or repository errors when the agent is missing, the
    /// new name is taken, or persistence fails.
    pub async fn update(
        &self,
        id: &AgentId,
        request: UpdateAgentRequest,
    ) -> AgentRegistryServiceResult<ManagedAgent> {
        let patch = build_patch(request)?;
        let mut agent = self.get(id).await?;
        if patch.is_empty() {
            return Ok(agent);
        }
        agent.apply(patch, &*self.clock);
        self.repository.update(&agent).await?;
        info!(agent_id = %agent.id(), "updated managed agent");
        Ok(agent)
    }

    /// Deletes an agent together with its versions and deployments.
    ///
    /// Running containers are not touched; use
    /// [`crate::release::services::ReleaseOrchestrator::decommission`] to tear
    /// down the live deployment first.
    ///
    /// # Errors
    ///
    /// Returns repository errors when the agent is missing or persistence
    /// fails.
    pub async fn delete(&self, id: &AgentId) -> AgentRegistryServiceResult<()> {
        self.repository.delete(id).await?;
        info!(agent_id = %id, "deleted managed agent");
        Ok(())
    }
}

fn build_patch(request: UpdateAgentRequest) -> Result<AgentPatch, AgentDomainError> {
    let UpdateAgentRequest {
        name,
        description,
        engine_config,
        retrieval,
        deployment,
    } = request;

    if let Some(source) = retrieval.as_ref() {
        source.validate()?;
    }

    Ok(AgentPatch {
        name: name.map(AgentName::new).transpose()?,
        description,
        engine_config: engine_config.map(EngineConfig::new).transpose()?,
        retrieval,
        deployment,
    })
}
