//! Repository port for managed agent persistence.

use crate::agent::domain::{AgentId, AgentName, ManagedAgent};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for agent repository operations.
pub type AgentRepositoryResult<T> = Result<T, AgentRepositoryError>;

/// Managed agent persistence contract.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Stores a new agent with a zero version counter.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRepositoryError::DuplicateAgent`] when the identifier is
    /// taken or [`AgentRepositoryError::DuplicateAgentName`] when the name is.
    async fn create(&self, agent: &ManagedAgent) -> AgentRepositoryResult<()>;

    /// Persists changes to an existing agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRepositoryError::NotFound`] when the agent does not
    /// exist or [`AgentRepositoryError::DuplicateAgentName`] when the new name
    /// belongs to another agent.
    async fn update(&self, agent: &ManagedAgent) -> AgentRepositoryResult<()>;

    /// Finds an agent by identifier.
    ///
    /// Returns `None` when the agent does not exist.
    async fn find_by_id(&self, id: &AgentId) -> AgentRepositoryResult<Option<ManagedAgent>>;

    /// Returns all agents, oldest first.
    async fn list_all(&self) -> AgentRepositoryResult<Vec<ManagedAgent>>;

    /// Deletes an agent together with its versions and deployments.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRepositoryError::NotFound`] when the agent does not
    /// exist.
    async fn delete(&self, id: &AgentId) -> AgentRepositoryResult<()>;
}

/// Errors returned by agent repository implementations.
#[derive(Debug, Clone, Error)]
pub enum AgentRepositoryError {
    /// An agent with the same identifier already exists.
    #[error("duplicate agent identifier: {0}")]
    DuplicateAgent(AgentId),

    /// An agent with the same name already exists.
    #[error("duplicate agent name: {0}")]
    DuplicateAgentName(AgentName),

    /// The agent was not found.
    #[error("agent not found: {0}")]
    NotFound(AgentId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl AgentRepositoryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
