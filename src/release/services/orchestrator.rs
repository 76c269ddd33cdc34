//! Deploy and rollback pipelines.
//!
//! [`ReleaseOrchestrator`] drives one agent through retrieve, configure,
//! build, publish, and deploy, recording versions and deployments as it
//! goes. Every run executes on its own spawned task, so a caller that stops
//! waiting does not interrupt a half-finished release.

use super::admission::{Admission, AdmissionControl, AdmissionError};
use super::settings::{PipelineSettings, ReleaseToolchain};
use crate::agent::domain::{AgentId, ManagedAgent};
use crate::agent::ports::{AgentRepository, AgentRepositoryError};
use crate::release::adapters::InjectionError;
use crate::release::domain::{
    AgentVersion, Deployment, ImageTag, PipelineStage, ReleaseDomainError, ServiceName,
    VersionId, VersionNumber, VersionStatus,
};
use crate::release::ports::{
    DeployError, DeploymentCommit, ImageBuildError, PublishError, ReleaseRepository,
    ReleaseRepositoryError, RetrievalError,
};
use camino::{Utf8Path, Utf8PathBuf};
use mockable::Clock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, info, instrument, warn};

/// Service-level errors for release pipelines.
#[derive(Debug, Error)]
pub enum ReleaseServiceError {
    /// No agent has the given identifier.
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    /// The agent has no version with the given number.
    #[error("agent {agent_id} has no version {version}")]
    VersionNotFound {
        /// Agent that was searched.
        agent_id: AgentId,
        /// Requested number.
        version: VersionNumber,
    },

    /// Agent lookup failed.
    #[error(transparent)]
    AgentRepository(#[from] AgentRepositoryError),

    /// A domain rule rejected the operation.
    #[error("{stage}: {source}")]
    Domain {
        /// Stage that failed.
        stage: PipelineStage,
        /// Underlying rule violation.
        source: ReleaseDomainError,
    },

    /// Version or deployment persistence failed.
    #[error("{stage}: {source}")]
    Repository {
        /// Stage that failed.
        stage: PipelineStage,
        /// Underlying persistence error.
        source: ReleaseRepositoryError,
    },

    /// Fetching source failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Writing configuration or the build descriptor failed.
    #[error(transparent)]
    Injection(#[from] InjectionError),

    /// Building the image failed.
    #[error(transparent)]
    Build(#[from] ImageBuildError),

    /// Publishing the image failed or is unsupported.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Starting or stopping the service failed or is unsupported.
    #[error(transparent)]
    Deploy(#[from] DeployError),

    /// A stage outlived its configured limit.
    #[error("{stage} timed out after {}s", .limit.as_secs())]
    TimedOut {
        /// Stage that timed out.
        stage: PipelineStage,
        /// Applied limit.
        limit: Duration,
    },

    /// The scratch working directory could not be created.
    #[error("failed to prepare workspace: {0}")]
    Workspace(Arc<std::io::Error>),

    /// Another pipeline held the agent for longer than the wait limit.
    #[error("agent {0} is busy with another release")]
    AgentBusy(AgentId),

    /// The pipeline pool is shut down.
    #[error("release pipeline pool is closed")]
    PoolClosed,

    /// The pipeline task panicked or was cancelled.
    #[error("release task aborted: {0}")]
    Join(#[from] JoinError),
}

impl ReleaseServiceError {
    /// Returns the pipeline stage the failure belongs to.
    ///
    /// `Unsupported` capability errors belong to preflight wherever they
    /// surface. Task aborts carry no stage.
    #[must_use]
    pub const fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::AgentNotFound(_)
            | Self::VersionNotFound { .. }
            | Self::AgentRepository(_)
            | Self::Publish(PublishError::Unsupported(_))
            | Self::Deploy(DeployError::Unsupported(_)) => Some(PipelineStage::Preflight),
            Self::Domain { stage, .. }
            | Self::Repository { stage, .. }
            | Self::TimedOut { stage, .. } => Some(*stage),
            Self::Retrieval(_) => Some(PipelineStage::Retrieve),
            Self::Injection(_) => Some(PipelineStage::Configure),
            Self::Build(_) => Some(PipelineStage::Build),
            Self::Publish(_) => Some(PipelineStage::Publish),
            Self::Deploy(_) => Some(PipelineStage::Deploy),
            Self::Workspace(_) => Some(PipelineStage::Workspace),
            Self::AgentBusy(_) | Self::PoolClosed => Some(PipelineStage::Admission),
            Self::Join(_) => None,
        }
    }

    /// Returns whether repeating the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AgentBusy(_)
                | Self::Repository {
                    source: ReleaseRepositoryError::VersionConflict { .. },
                    ..
                }
        )
    }
}

/// Result type for release service operations.
pub type ReleaseServiceResult<T> = Result<T, ReleaseServiceError>;

fn domain(stage: PipelineStage) -> impl FnOnce(ReleaseDomainError) -> ReleaseServiceError {
    move |source| ReleaseServiceError::Domain { stage, source }
}

fn repository(stage: PipelineStage) -> impl FnOnce(ReleaseRepositoryError) -> ReleaseServiceError {
    move |source| ReleaseServiceError::Repository { stage, source }
}

async fn staged<T, E, F>(stage: PipelineStage, limit: Duration, work: F) -> ReleaseServiceResult<T>
where
    F: Future<Output = Result<T, E>>,
    ReleaseServiceError: From<E>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result.map_err(ReleaseServiceError::from),
        Err(_) => Err(ReleaseServiceError::TimedOut { stage, limit }),
    }
}

/// Outcome of a successful deploy or rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    /// The version now serving traffic, in `Deployed` status.
    pub version: AgentVersion,
    /// The deployment record created by this run.
    pub deployment: Deployment,
}

/// Whether a run builds a new version or redeploys an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReleaseMode {
    Deploy,
    Rollback,
}

/// Release pipeline service.
pub struct ReleaseOrchestrator<A, R, C>
where
    A: AgentRepository + 'static,
    R: ReleaseRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    inner: Arc<Pipeline<A, R, C>>,
}

impl<A, R, C> Clone for ReleaseOrchestrator<A, R, C>
where
    A: AgentRepository + 'static,
    R: ReleaseRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Pipeline<A, R, C> {
    agents: Arc<A>,
    releases: Arc<R>,
    clock: Arc<C>,
    toolchain: ReleaseToolchain,
    settings: PipelineSettings,
    admission: AdmissionControl,
}

impl<A, R, C> ReleaseOrchestrator<A, R, C>
where
    A: AgentRepository + 'static,
    R: ReleaseRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a new orchestrator.
    #[must_use]
    pub fn new(
        agents: Arc<A>,
        releases: Arc<R>,
        clock: Arc<C>,
        toolchain: ReleaseToolchain,
        settings: PipelineSettings,
    ) -> Self {
        let admission =
            AdmissionControl::new(settings.max_concurrent_pipelines, settings.lock_timeout);
        Self {
            inner: Arc::new(Pipeline {
                agents,
                releases,
                clock,
                toolchain,
                settings,
                admission,
            }),
        }
    }

    /// Builds, publishes, and deploys a new version of an agent.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseServiceError`] tagged with the failing stage. Failures
    /// before the version is published leave no version row; later failures
    /// leave it `Failed`.
    pub async fn deploy(&self, agent_id: &AgentId) -> ReleaseServiceResult<ReleaseReport> {
        let pipeline = Arc::clone(&self.inner);
        let id = agent_id.clone();
        tokio::spawn(async move { pipeline.deploy(id).await }).await?
    }

    /// Redeploys a previously built version without rebuilding it.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseServiceError::VersionNotFound`] for unknown numbers,
    /// [`ReleaseServiceError::Domain`] when the version never produced an
    /// image, or capability errors. Nothing is persisted on failure.
    pub async fn rollback(
        &self,
        agent_id: &AgentId,
        version: VersionNumber,
    ) -> ReleaseServiceResult<ReleaseReport> {
        let pipeline = Arc::clone(&self.inner);
        let id = agent_id.clone();
        tokio::spawn(async move { pipeline.rollback(id, version).await }).await?
    }

    /// Stops the agent's running instance and deletes the agent with its
    /// versions and deployments.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseServiceError::AgentNotFound`], deploy errors when the
    /// instance cannot be removed (the agent is kept in that case), or
    /// repository errors.
    pub async fn decommission(&self, agent_id: &AgentId) -> ReleaseServiceResult<()> {
        let pipeline = Arc::clone(&self.inner);
        let id = agent_id.clone();
        tokio::spawn(async move { pipeline.decommission(id).await }).await?
    }

    /// Returns an agent's versions, highest number first.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseServiceError::AgentNotFound`] or repository errors.
    pub async fn list_versions(&self, agent_id: &AgentId) -> ReleaseServiceResult<Vec<AgentVersion>> {
        self.inner.load_agent(agent_id).await?;
        self.inner
            .releases
            .list_versions(agent_id)
            .await
            .map_err(repository(PipelineStage::Record))
    }

    /// Returns an agent's deployments, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseServiceError::AgentNotFound`] or repository errors.
    pub async fn list_deployments(
        &self,
        agent_id: &AgentId,
    ) -> ReleaseServiceResult<Vec<Deployment>> {
        self.inner.load_agent(agent_id).await?;
        self.inner
            .releases
            .list_deployments(agent_id)
            .await
            .map_err(repository(PipelineStage::Record))
    }
}

/// Scratch directory removed when dropped.
struct Workspace {
    _guard: TempDir,
    path: Utf8PathBuf,
}

impl Workspace {
    fn create(root: Option<&Utf8Path>) -> ReleaseServiceResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("atelier-");
        let guard = match root {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|err| ReleaseServiceError::Workspace(Arc::new(err)))?;
        let path = Utf8PathBuf::from_path_buf(guard.path().to_path_buf()).map_err(|path| {
            ReleaseServiceError::Workspace(Arc::new(std::io::Error::other(format!(
                "workspace path {} is not UTF-8",
                path.display()
            ))))
        })?;
        Ok(Self {
            _guard: guard,
            path,
        })
    }
}

impl<A, R, C> Pipeline<A, R, C>
where
    A: AgentRepository,
    R: ReleaseRepository,
    C: Clock + Send + Sync,
{
    async fn admit(&self, agent_id: &AgentId) -> ReleaseServiceResult<Admission> {
        self.admission
            .admit(agent_id)
            .await
            .map_err(|err| match err {
                AdmissionError::Busy => ReleaseServiceError::AgentBusy(agent_id.clone()),
                AdmissionError::Closed => ReleaseServiceError::PoolClosed,
            })
    }

    async fn load_agent(&self, agent_id: &AgentId) -> ReleaseServiceResult<ManagedAgent> {
        self.agents
            .find_by_id(agent_id)
            .await?
            .ok_or_else(|| ReleaseServiceError::AgentNotFound(agent_id.clone()))
    }

    #[instrument(skip_all, fields(agent_id = %agent_id))]
    async fn deploy(&self, agent_id: AgentId) -> ReleaseServiceResult<ReleaseReport> {
        let _admission = self.admit(&agent_id).await?;

        let agent = self.load_agent(&agent_id).await?;
        self.toolchain.publisher.ensure_supported()?;
        self.toolchain.deployer.ensure_supported(agent.deployment())?;
        ImageTag::validate_prefix(&self.settings.image_prefix)
            .map_err(domain(PipelineStage::Preflight))?;

        let number = self
            .releases
            .allocate_next_version(&agent_id)
            .await
            .map_err(repository(PipelineStage::Allocate))?;
        info!(version = %number, "allocated version");

        let image_tag =
            ImageTag::for_version(&self.settings.image_prefix, &agent_id, agent.name(), number)
                .map_err(domain(PipelineStage::Build))?;
        let mut version = AgentVersion::new(
            agent_id.clone(),
            number,
            image_tag,
            agent.deployment().target(),
            &*self.clock,
        );
        self.produce(&agent, &mut version).await?;
        info!(version = %number, image = %version.image_tag(), "version built");

        match self
            .deploy_and_record(&agent, &version, ReleaseMode::Deploy)
            .await
        {
            Ok(report) => {
                info!(version = %number, endpoint = report.deployment.endpoint_url(), "version deployed");
                Ok(report)
            }
            Err(err) => {
                self.mark_failed(version).await;
                Err(err)
            }
        }
    }

    /// Runs retrieve through publish and stores the `Built` version.
    ///
    /// The workspace lives only for this call. Any failure from the build
    /// stage onwards discards the image.
    async fn produce(
        &self,
        agent: &ManagedAgent,
        version: &mut AgentVersion,
    ) -> ReleaseServiceResult<()> {
        let workspace = Workspace::create(self.settings.workspace_root.as_deref())?;
        let source_dir = staged(
            PipelineStage::Retrieve,
            self.settings.retrieve_timeout,
            self.toolchain
                .retriever
                .retrieve(agent.retrieval(), &workspace.path),
        )
        .await?;

        let injector = self.toolchain.injector.clone();
        let engine_config = agent.engine_config().clone();
        let context_dir = source_dir.clone();
        let descriptor =
            tokio::task::spawn_blocking(move || injector.inject(&context_dir, &engine_config))
                .await??;
        info!(?descriptor, %source_dir, "build context prepared");

        let outcome = self.build_and_store(&source_dir, version).await;
        if outcome.is_err() {
            self.discard_image(version.image_tag()).await;
        }
        outcome
    }

    async fn build_and_store(
        &self,
        source_dir: &Utf8Path,
        version: &mut AgentVersion,
    ) -> ReleaseServiceResult<()> {
        let image = staged(
            PipelineStage::Build,
            self.settings.build_timeout,
            self.toolchain.builder.build(source_dir, version.image_tag()),
        )
        .await?;
        let artifact = staged(
            PipelineStage::Publish,
            self.settings.publish_timeout,
            self.toolchain.publisher.publish(&image),
        )
        .await?;
        version
            .mark_built(artifact, &*self.clock)
            .map_err(domain(PipelineStage::Record))?;
        self.releases
            .insert_version(version)
            .await
            .map_err(repository(PipelineStage::Record))?;
        Ok(())
    }

    async fn discard_image(&self, image: &ImageTag) {
        if let Err(err) = self.toolchain.builder.discard(image).await {
            warn!(%image, error = %err, "could not discard image");
        }
    }

    async fn mark_failed(&self, mut version: AgentVersion) {
        if let Err(err) = version.mark_failed(&*self.clock) {
            error!(version = %version.version(), error = %err, "could not mark version failed");
            return;
        }
        if let Err(err) = self.releases.update_version(&version).await {
            error!(version = %version.version(), error = %err, "could not persist failed version");
        }
    }

    #[instrument(skip_all, fields(agent_id = %agent_id, version = %number))]
    async fn rollback(
        &self,
        agent_id: AgentId,
        number: VersionNumber,
    ) -> ReleaseServiceResult<ReleaseReport> {
        let _admission = self.admit(&agent_id).await?;

        let agent = self.load_agent(&agent_id).await?;
        self.toolchain.deployer.ensure_supported(agent.deployment())?;
        let target = self
            .releases
            .find_version(&agent_id, number)
            .await
            .map_err(repository(PipelineStage::Preflight))?
            .ok_or_else(|| ReleaseServiceError::VersionNotFound {
                agent_id: agent_id.clone(),
                version: number,
            })?;
        target
            .ensure_redeployable()
            .map_err(domain(PipelineStage::Preflight))?;

        let report = self
            .deploy_and_record(&agent, &target, ReleaseMode::Rollback)
            .await?;
        info!(endpoint = report.deployment.endpoint_url(), "rolled back");
        Ok(report)
    }

    /// Starts `target` and commits the deployment, the deployed version, and
    /// on rollback the superseded version, in one repository call.
    ///
    /// Deployers remove the running instance before starting its
    /// replacement, so a deploy-stage failure also stops the previously
    /// running deployment record.
    async fn deploy_and_record(
        &self,
        agent: &ManagedAgent,
        target: &AgentVersion,
        mode: ReleaseMode,
    ) -> ReleaseServiceResult<ReleaseReport> {
        let running = self
            .releases
            .find_running_deployment(agent.id())
            .await
            .map_err(repository(PipelineStage::Deploy))?;
        let superseded = match (mode, running.as_ref()) {
            (ReleaseMode::Rollback, Some(current)) if current.version_id() != target.id() => {
                self.superseded_version(current.version_id()).await?
            }
            _ => None,
        };

        let service = ServiceName::for_agent(agent.id());
        let started = staged(
            PipelineStage::Deploy,
            self.settings.deploy_timeout,
            self.toolchain
                .deployer
                .deploy(target.image_tag(), &service, agent.deployment()),
        )
        .await;
        let outcome = match started {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Some(replaced) = running {
                    self.stop_replaced(replaced).await;
                }
                return Err(err);
            }
        };

        let mut deployed = target.clone();
        deployed
            .mark_deployed(outcome.deploy_ref.clone(), &*self.clock)
            .map_err(domain(PipelineStage::Record))?;
        let deployment = Deployment::new(
            &deployed,
            agent.deployment().target(),
            outcome,
            &*self.clock,
        );
        let commit = DeploymentCommit {
            deployment,
            version: deployed,
            superseded,
        };
        self.releases
            .record_deployment(&commit)
            .await
            .map_err(repository(PipelineStage::Record))?;

        let DeploymentCommit {
            deployment,
            version,
            ..
        } = commit;
        Ok(ReleaseReport {
            version,
            deployment,
        })
    }

    async fn stop_replaced(&self, mut deployment: Deployment) {
        if let Err(err) = deployment.mark_stopped(&*self.clock) {
            error!(
                deployment_id = %deployment.id(),
                error = %err,
                "could not stop replaced deployment"
            );
            return;
        }
        match self.releases.update_deployment(&deployment).await {
            Ok(()) => warn!(
                deployment_id = %deployment.id(),
                deploy_ref = %deployment.deploy_ref(),
                "failed deploy removed the running instance; deployment stopped"
            ),
            Err(err) => error!(
                deployment_id = %deployment.id(),
                error = %err,
                "could not persist stopped deployment"
            ),
        }
    }

    async fn superseded_version(
        &self,
        version_id: VersionId,
    ) -> ReleaseServiceResult<Option<AgentVersion>> {
        let Some(mut current) = self
            .releases
            .find_version_by_id(version_id)
            .await
            .map_err(repository(PipelineStage::Deploy))?
        else {
            return Ok(None);
        };
        if current.status() != VersionStatus::Deployed {
            return Ok(None);
        }
        current
            .mark_rolled_back(&*self.clock)
            .map_err(domain(PipelineStage::Record))?;
        Ok(Some(current))
    }

    #[instrument(skip_all, fields(agent_id = %agent_id))]
    async fn decommission(&self, agent_id: AgentId) -> ReleaseServiceResult<()> {
        let _admission = self.admit(&agent_id).await?;

        let agent = self.load_agent(&agent_id).await?;
        let running = self
            .releases
            .find_running_deployment(&agent_id)
            .await
            .map_err(repository(PipelineStage::Deploy))?;
        if let Some(deployment) = running {
            staged(
                PipelineStage::Deploy,
                self.settings.deploy_timeout,
                self.toolchain
                    .deployer
                    .delete(deployment.deploy_ref(), agent.deployment()),
            )
            .await?;
            info!(deploy_ref = %deployment.deploy_ref(), "removed running instance");
        }
        self.agents.delete(&agent_id).await?;
        info!("decommissioned agent");
        Ok(())
    }
}
