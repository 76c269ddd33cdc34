//! Per-agent serialization and the global pipeline pool.

use crate::agent::domain::AgentId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

/// Why admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AdmissionError {
    /// Another pipeline held the agent past the wait limit.
    Busy,
    /// The pipeline pool has shut down.
    Closed,
}

/// Proof that a pipeline may run. Dropping it releases the agent and the
/// pool slot.
pub(super) struct Admission {
    _agent: OwnedMutexGuard<()>,
    _slot: OwnedSemaphorePermit,
}

/// One async mutex per agent plus a bounded pool shared by all agents.
pub(super) struct AdmissionControl {
    agents: Mutex<HashMap<AgentId, Arc<tokio::sync::Mutex<()>>>>,
    slots: Arc<Semaphore>,
    wait: Duration,
}

impl AdmissionControl {
    pub(super) fn new(max_concurrent: usize, wait: Duration) -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
            wait,
        }
    }

    /// Waits for exclusive use of `agent_id`, then for a pool slot.
    ///
    /// The agent lock is taken first so queued runs of one agent do not
    /// occupy slots other agents could use.
    pub(super) async fn admit(&self, agent_id: &AgentId) -> Result<Admission, AdmissionError> {
        let lock = self.agent_lock(agent_id);
        let agent = tokio::time::timeout(self.wait, lock.lock_owned())
            .await
            .map_err(|_| AdmissionError::Busy)?;
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| AdmissionError::Closed)?;
        Ok(Admission {
            _agent: agent,
            _slot: slot,
        })
    }

    fn agent_lock(&self, agent_id: &AgentId) -> Arc<tokio::sync::Mutex<()>> {
        let mut agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        agents.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(agents.entry(agent_id.clone()).or_default())
    }
}
