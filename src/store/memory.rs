//! In-memory store for tests and local dry runs.

use crate::agent::{
    domain::{AgentId, AgentName, ManagedAgent},
    ports::{AgentRepository, AgentRepositoryError, AgentRepositoryResult},
};
use crate::release::{
    domain::{AgentVersion, Deployment, DeploymentStatus, VersionId, VersionNumber},
    ports::{DeploymentCommit, ReleaseRepository, ReleaseRepositoryError, ReleaseRepositoryResult},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory store implementing both repository ports.
///
/// Agents, versions, and deployments share one lock, so the version counter
/// and [`ReleaseRepository::record_deployment`] are atomic with respect to
/// every other operation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    agents: HashMap<AgentId, ManagedAgent>,
    agent_order: Vec<AgentId>,
    name_index: HashMap<AgentName, AgentId>,
    counters: HashMap<AgentId, u32>,
    versions: HashMap<VersionId, AgentVersion>,
    version_index: HashMap<(AgentId, VersionNumber), VersionId>,
    deployments: Vec<Deployment>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn agent_lock_error(err: impl ToString) -> AgentRepositoryError {
    AgentRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

fn release_lock_error(err: impl ToString) -> ReleaseRepositoryError {
    ReleaseRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl AgentRepository for InMemoryStore {
    async fn create(&self, agent: &ManagedAgent) -> AgentRepositoryResult<()> {
        let mut state = self.state.write().map_err(agent_lock_error)?;
        if state.agents.contains_key(agent.id()) {
            return Err(AgentRepositoryError::DuplicateAgent(agent.id().clone()));
        }
        if state.name_index.contains_key(agent.name()) {
            return Err(AgentRepositoryError::DuplicateAgentName(agent.name().clone()));
        }

        state
            .name_index
            .insert(agent.name().clone(), agent.id().clone());
        state.counters.insert(agent.id().clone(), 0);
        state.agent_order.push(agent.id().clone());
        state.agents.insert(agent.id().clone(), agent.clone());
        Ok(())
    }

    async fn update(&self, agent: &ManagedAgent) -> AgentRepositoryResult<()> {
        let mut state = self.state.write().map_err(agent_lock_error)?;
        let previous_name = state
            .agents
            .get(agent.id())
            .ok_or_else(|| AgentRepositoryError::NotFound(agent.id().clone()))?
            .name()
            .clone();

        if state
            .name_index
            .get(agent.name())
            .is_some_and(|owner| owner != agent.id())
        {
            return Err(AgentRepositoryError::DuplicateAgentName(agent.name().clone()));
        }

        state.name_index.remove(&previous_name);
        state
            .name_index
            .insert(agent.name().clone(), agent.id().clone());
        state.agents.insert(agent.id().clone(), agent.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AgentId) -> AgentRepositoryResult<Option<ManagedAgent>> {
        let state = self.state.read().map_err(agent_lock_error)?;
        Ok(state.agents.get(id).cloned())
    }

    async fn list_all(&self) -> AgentRepositoryResult<Vec<ManagedAgent>> {
        let state = self.state.read().map_err(agent_lock_error)?;
        Ok(state
            .agent_order
            .iter()
            .filter_map(|id| state.agents.get(id).cloned())
            .collect())
    }

    async fn delete(&self, id: &AgentId) -> AgentRepositoryResult<()> {
        let mut state = self.state.write().map_err(agent_lock_error)?;
        let agent = state
            .agents
            .remove(id)
            .ok_or_else(|| AgentRepositoryError::NotFound(id.clone()))?;

        state.name_index.remove(agent.name());
        state.counters.remove(id);
        state.agent_order.retain(|candidate| candidate != id);
        state.versions.retain(|_, version| version.agent_id() != id);
        state.version_index.retain(|(owner, _), _| owner != id);
        state
            .deployments
            .retain(|deployment| deployment.agent_id() != id);
        Ok(())
    }
}

#[async_trait]
impl ReleaseRepository for InMemoryStore {
    async fn allocate_next_version(
        &self,
        agent_id: &AgentId,
    ) -> ReleaseRepositoryResult<VersionNumber> {
        let mut state = self.state.write().map_err(release_lock_error)?;
        let counter = state
            .counters
            .get_mut(agent_id)
            .ok_or_else(|| ReleaseRepositoryError::AgentNotFound(agent_id.clone()))?;
        let next = counter.checked_add(1).ok_or_else(|| {
            ReleaseRepositoryError::persistence(std::io::Error::other(format!(
                "version counter of {agent_id} is exhausted"
            )))
        })?;
        *counter = next;
        VersionNumber::new(next).map_err(ReleaseRepositoryError::invalid_persisted_data)
    }

    async fn insert_version(&self, version: &AgentVersion) -> ReleaseRepositoryResult<VersionId> {
        let mut state = self.state.write().map_err(release_lock_error)?;
        if !state.agents.contains_key(version.agent_id()) {
            return Err(ReleaseRepositoryError::AgentNotFound(
                version.agent_id().clone(),
            ));
        }
        if version.artifact_uri().is_none() {
            return Err(ReleaseRepositoryError::IncompleteVersion(version.version()));
        }
        let key = (version.agent_id().clone(), version.version());
        if state.version_index.contains_key(&key) || state.versions.contains_key(&version.id()) {
            return Err(ReleaseRepositoryError::VersionConflict {
                agent_id: version.agent_id().clone(),
                version: version.version(),
            });
        }

        state.version_index.insert(key, version.id());
        state.versions.insert(version.id(), version.clone());
        Ok(version.id())
    }

    async fn update_version(&self, version: &AgentVersion) -> ReleaseRepositoryResult<()> {
        let mut state = self.state.write().map_err(release_lock_error)?;
        let stored = state
            .versions
            .get_mut(&version.id())
            .ok_or(ReleaseRepositoryError::VersionNotFound(version.id()))?;
        *stored = version.clone();
        Ok(())
    }

    async fn find_version(
        &self,
        agent_id: &AgentId,
        version: VersionNumber,
    ) -> ReleaseRepositoryResult<Option<AgentVersion>> {
        let state = self.state.read().map_err(release_lock_error)?;
        Ok(state
            .version_index
            .get(&(agent_id.clone(), version))
            .and_then(|id| state.versions.get(id))
            .cloned())
    }

    async fn find_version_by_id(
        &self,
        id: VersionId,
    ) -> ReleaseRepositoryResult<Option<AgentVersion>> {
        let state = self.state.read().map_err(release_lock_error)?;
        Ok(state.versions.get(&id).cloned())
    }

    async fn list_versions(&self, agent_id: &AgentId) -> ReleaseRepositoryResult<Vec<AgentVersion>> {
        let state = self.state.read().map_err(release_lock_error)?;
        let mut versions: Vec<AgentVersion> = state
            .versions
            .values()
            .filter(|version| version.agent_id() == agent_id)
            .cloned()
            .collect();
        versions.sort_by(|left, right| right.version().cmp(&left.version()));
        Ok(versions)
    }

    async fn find_running_deployment(
        &self,
        agent_id: &AgentId,
    ) -> ReleaseRepositoryResult<Option<Deployment>> {
        let state = self.state.read().map_err(release_lock_error)?;
        Ok(state
            .deployments
            .iter()
            .rev()
            .find(|deployment| {
                deployment.agent_id() == agent_id
                    && deployment.status() == DeploymentStatus::Running
            })
            .cloned())
    }

    async fn list_deployments(&self, agent_id: &AgentId) -> ReleaseRepositoryResult<Vec<Deployment>> {
        let state = self.state.read().map_err(release_lock_error)?;
        Ok(state
            .deployments
            .iter()
            .rev()
            .filter(|deployment| deployment.agent_id() == agent_id)
            .cloned()
            .collect())
    }

    async fn update_deployment(&self, deployment: &Deployment) -> ReleaseRepositoryResult<()> {
        let mut state = self.state.write().map_err(release_lock_error)?;
        let stored = state
            .deployments
            .iter_mut()
            .find(|stored| stored.id() == deployment.id())
            .ok_or(ReleaseRepositoryError::DeploymentNotFound(deployment.id()))?;
        *stored = deployment.clone();
        Ok(())
    }

    async fn record_deployment(&self, commit: &DeploymentCommit) -> ReleaseRepositoryResult<()> {
        let mut state = self.state.write().map_err(release_lock_error)?;
        let changed = std::iter::once(&commit.version).chain(commit.superseded.as_ref());
        for version in changed.clone() {
            if !state.versions.contains_key(&version.id()) {
                return Err(ReleaseRepositoryError::VersionNotFound(version.id()));
            }
        }

        let agent_id = commit.deployment.agent_id();
        for deployment in &mut state.deployments {
            if deployment.agent_id() == agent_id
                && deployment.status() == DeploymentStatus::Running
            {
                deployment
                    .mark_superseded_by(&commit.deployment)
                    .map_err(ReleaseRepositoryError::invalid_persisted_data)?;
            }
        }
        for version in changed {
            state.versions.insert(version.id(), version.clone());
        }
        state.deployments.push(commit.deployment.clone());
        Ok(())
    }
}
