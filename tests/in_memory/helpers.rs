//! Shared fixtures for in-memory integration tests.

use atelier::agent::{
    domain::{AgentId, DeploymentConfig, RetrievalConfig},
    services::{AgentRegistryService, CreateAgentRequest},
};
use atelier::release::{
    adapters::{
        ConfigInjector, InMemoryContainerHost, InMemoryImageBuilder, RegistryPublisher,
        ScriptedCommandRunner, SourceRetriever,
    },
    ports::RegistryKind,
    services::{PipelineSettings, ReleaseOrchestrator, ReleaseToolchain},
};
use atelier::store::InMemoryStore;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use mockable::DefaultClock;
use rstest::fixture;
use std::io::{Cursor, Write};
use std::sync::Arc;

/// Registry service over the in-memory store.
pub type TestRegistry = AgentRegistryService<InMemoryStore, DefaultClock>;
/// Orchestrator over the in-memory store.
pub type TestOrchestrator = ReleaseOrchestrator<InMemoryStore, InMemoryStore, DefaultClock>;

/// Services wired to in-memory capabilities, with handles for inspection.
pub struct Harness {
    /// Shared store.
    pub store: Arc<InMemoryStore>,
    /// Image builder fake.
    pub builder: Arc<InMemoryImageBuilder>,
    /// Container host fake.
    pub host: Arc<InMemoryContainerHost>,
    /// Agent registration service.
    pub registry: TestRegistry,
    /// Release orchestrator.
    pub orchestrator: TestOrchestrator,
}

impl Harness {
    /// Builds a harness publishing to `registry`.
    #[must_use]
    pub fn with_registry(registry: RegistryKind) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let builder = Arc::new(InMemoryImageBuilder::new());
        let host = Arc::new(InMemoryContainerHost::new());
        let clock = Arc::new(DefaultClock);
        let toolchain = ReleaseToolchain {
            retriever: Arc::new(SourceRetriever::new(Arc::new(ScriptedCommandRunner::new()))),
            injector: ConfigInjector::default(),
            builder: Arc::clone(&builder) as _,
            publisher: Arc::new(RegistryPublisher::new(registry)),
            deployer: Arc::clone(&host) as _,
        };
        let settings = PipelineSettings {
            max_concurrent_pipelines: 8,
            ..PipelineSettings::default()
        };
        Self {
            registry: AgentRegistryService::new(Arc::clone(&store), Arc::clone(&clock)),
            orchestrator: ReleaseOrchestrator::new(
                Arc::clone(&store),
                Arc::clone(&store),
                clock,
                toolchain,
                settings,
            ),
            store,
            builder,
            host,
        }
    }

    /// Registers an agent with the given source and a local target.
    ///
    /// # Errors
    ///
    /// Returns an error when registration fails.
    pub async fn register(&self, name: &str, retrieval: RetrievalConfig) -> eyre::Result<AgentId> {
        self.register_as(name, name, retrieval).await
    }

    /// Registers an agent whose id differs from its display name.
    ///
    /// # Errors
    ///
    /// Returns an error when registration fails.
    pub async fn register_as(
        &self,
        id: &str,
        name: &str,
        retrieval: RetrievalConfig,
    ) -> eyre::Result<AgentId> {
        let request = CreateAgentRequest::new(name, retrieval)
            .with_id(id)
            .with_deployment(DeploymentConfig::local());
        let agent = self.registry.create(request).await?;
        Ok(agent.id().clone())
    }
}

/// Provides a harness publishing to the local engine.
#[fixture]
pub fn harness() -> Harness {
    Harness::with_registry(RegistryKind::Local)
}

/// Encodes a small agent project as a base64 zip archive source.
///
/// # Errors
///
/// Returns an error when the archive cannot be written.
pub fn zip_source() -> eyre::Result<RetrievalConfig> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file("agent/main.py", zip::write::SimpleFileOptions::default())?;
    writer.write_all(b"def run():\n    return 'hello'\n")?;
    let bytes = writer.finish()?.into_inner();
    Ok(RetrievalConfig::archive(STANDARD.encode(bytes)))
}
