//! Shared world state for release BDD scenarios.

use std::sync::Arc;

use atelier::agent::{domain::AgentId, services::AgentRegistryService};
use atelier::release::{
    adapters::{
        ConfigInjector, InMemoryContainerHost, InMemoryImageBuilder, RegistryPublisher,
        ScriptedCommandRunner, SourceRetriever,
    },
    services::{
        PipelineSettings, ReleaseOrchestrator, ReleaseReport, ReleaseServiceError,
        ReleaseToolchain,
    },
};
use atelier::store::InMemoryStore;
use mockable::DefaultClock;
use rstest::fixture;

/// Registry service used by the BDD world.
pub type TestRegistry = AgentRegistryService<InMemoryStore, DefaultClock>;
/// Orchestrator used by the BDD world.
pub type TestOrchestrator = ReleaseOrchestrator<InMemoryStore, InMemoryStore, DefaultClock>;

/// Scenario world for release behaviour tests.
pub struct ReleaseWorld {
    /// Agent registration service.
    pub registry: TestRegistry,
    /// Release orchestrator under test.
    pub orchestrator: TestOrchestrator,
    /// Agent created by the scenario.
    pub agent_id: Option<AgentId>,
    /// Result of the last deploy or rollback attempt.
    pub last_release: Option<Result<ReleaseReport, ReleaseServiceError>>,
}

impl ReleaseWorld {
    /// Creates a world backed by in-memory capabilities.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(DefaultClock);
        let toolchain = ReleaseToolchain {
            retriever: Arc::new(SourceRetriever::new(Arc::new(ScriptedCommandRunner::new()))),
            injector: ConfigInjector::default(),
            builder: Arc::new(InMemoryImageBuilder::new()),
            publisher: Arc::new(RegistryPublisher::default()),
            deployer: Arc::new(InMemoryContainerHost::new()),
        };
        Self {
            registry: AgentRegistryService::new(Arc::clone(&store), Arc::clone(&clock)),
            orchestrator: ReleaseOrchestrator::new(
                Arc::clone(&store),
                store,
                clock,
                toolchain,
                PipelineSettings::default(),
            ),
            agent_id: None,
            last_release: None,
        }
    }

    /// Returns the scenario's agent.
    ///
    /// # Errors
    ///
    /// Returns an error when no agent was registered yet.
    pub fn agent(&self) -> eyre::Result<AgentId> {
        self.agent_id
            .clone()
            .ok_or_else(|| eyre::eyre!("no agent registered in scenario world"))
    }
}

impl Default for ReleaseWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ReleaseWorld {
    ReleaseWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
