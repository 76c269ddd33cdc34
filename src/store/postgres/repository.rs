//! `PostgreSQL` implementation of the agent and release repositories.

use super::{
    models::{AgentRow, DeploymentRow, NewAgentRow, VersionRow},
    schema::{agent_versions, deployments, managed_agents},
};
use crate::agent::{
    domain::{
        AgentId, AgentName, DeploymentConfig, DeploymentTarget, EngineConfig, ManagedAgent,
        PersistedAgentData, RetrievalConfig,
    },
    ports::{AgentRepository, AgentRepositoryError, AgentRepositoryResult},
};
use crate::release::{
    domain::{
        AgentVersion, ArtifactUri, DeployRef, Deployment, DeploymentId, DeploymentStatus,
        ImageTag, PersistedDeploymentData, PersistedVersionData, VersionId, VersionNumber,
        VersionStatus,
    },
    ports::{DeploymentCommit, ReleaseRepository, ReleaseRepositoryError, ReleaseRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type.
pub type AtelierPgPool = Pool<ConnectionManager<PgConnection>>;

/// Builds a connection pool for `database_url`.
///
/// # Errors
///
/// Returns [`PoolError`] when no connection can be established.
pub fn connect(database_url: &str, max_size: u32) -> Result<AtelierPgPool, PoolError> {
    Pool::builder()
        .max_size(max_size.max(1))
        .build(ConnectionManager::<PgConnection>::new(database_url))
}

/// Repository errors that can wrap an opaque persistence failure.
trait PersistenceFailure: Sized {
    fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self;
}

impl PersistenceFailure for AgentRepositoryError {
    fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::persistence(err)
    }
}

impl PersistenceFailure for ReleaseRepositoryError {
    fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::persistence(err)
    }
}

impl From<DieselError> for ReleaseRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

/// `PostgreSQL`-backed store for agents, versions, and deployments.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: AtelierPgPool,
}

impl PostgresStore {
    /// Creates a store from a connection pool.
    #[must_use]
    pub const fn new(pool: AtelierPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: PersistenceFailure + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(E::persistence)?;
            operation(&mut connection)
        })
        .await
        .map_err(E::persistence)?
    }
}

fn constraint_is(info: &dyn DatabaseErrorInformation, name: &str) -> bool {
    info.constraint_name().is_some_and(|constraint| constraint == name)
}

fn storage_number(version: VersionNumber) -> ReleaseRepositoryResult<i32> {
    i32::try_from(version.value()).map_err(ReleaseRepositoryError::persistence)
}

#[async_trait]
impl AgentRepository for PostgresStore {
    async fn create(&self, agent: &ManagedAgent) -> AgentRepositoryResult<()> {
        let agent_id = agent.id().clone();
        let agent_name = agent.name().clone();
        let row = NewAgentRow {
            id: agent.id().as_str().to_owned(),
            name: agent.name().as_str().to_owned(),
            description: agent.description().map(str::to_owned),
            engine_config: agent.engine_config().as_value().clone(),
            retrieval_config: serde_json::to_value(agent.retrieval())
                .map_err(AgentRepositoryError::persistence)?,
            deployment_config: serde_json::to_value(agent.deployment())
                .map_err(AgentRepositoryError::persistence)?,
            created_at: agent.created_at(),
            updated_at: agent.updated_at(),
        };

        self.run_blocking(move |connection| {
            diesel::insert_into(managed_agents::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if constraint_is(info.as_ref(), "managed_agents_name_key") =>
                    {
                        AgentRepositoryError::DuplicateAgentName(agent_name.clone())
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        AgentRepositoryError::DuplicateAgent(agent_id.clone())
                    }
                    _ => AgentRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, agent: &ManagedAgent) -> AgentRepositoryResult<()> {
        let agent_id = agent.id().clone();
        let agent_name = agent.name().clone();
        let description = agent.description().map(str::to_owned);
        let engine_config = agent.engine_config().as_value().clone();
        let retrieval_config =
            serde_json::to_value(agent.retrieval()).map_err(AgentRepositoryError::persistence)?;
        let deployment_config =
            serde_json::to_value(agent.deployment()).map_err(AgentRepositoryError::persistence)?;
        let updated_at = agent.updated_at();

        self.run_blocking(move |connection| {
            let updated_count = diesel::update(managed_agents::table.find(agent_id.as_str()))
                .set((
                    managed_agents::name.eq(agent_name.as_str()),
                    managed_agents::description.eq(&description),
                    managed_agents::engine_config.eq(&engine_config),
                    managed_agents::retrieval_config.eq(&retrieval_config),
                    managed_agents::deployment_config.eq(&deployment_config),
                    managed_agents::updated_at.eq(updated_at),
                ))
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if constraint_is(info.as_ref(), "managed_agents_name_key") =>
                    {
                        AgentRepositoryError::DuplicateAgentName(agent_name.clone())
                    }
                    _ => AgentRepositoryError::persistence(err),
                })?;
            if updated_count == 0 {
                return Err(AgentRepositoryError::NotFound(agent_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: &AgentId) -> AgentRepositoryResult<Option<ManagedAgent>> {
        let key = id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = managed_agents::table
                .find(key)
                .select(AgentRow::as_select())
                .first::<AgentRow>(connection)
                .optional()
                .map_err(AgentRepositoryError::persistence)?;
            row.map(row_to_agent).transpose()
        })
        .await
    }

    async fn list_all(&self) -> AgentRepositoryResult<Vec<ManagedAgent>> {
        self.run_blocking(move |connection| {
            let rows = managed_agents::table
                .order((managed_agents::created_at.asc(), managed_agents::id.asc()))
                .select(AgentRow::as_select())
                .load::<AgentRow>(connection)
                .map_err(AgentRepositoryError::persistence)?;
            rows.into_iter().map(row_to_agent).collect()
        })
        .await
    }

    async fn delete(&self, id: &AgentId) -> AgentRepositoryResult<()> {
        let agent_id = id.clone();
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(managed_agents::table.find(agent_id.as_str()))
                .execute(connection)
                .map_err(AgentRepositoryError::persistence)?;
            if deleted == 0 {
                return Err(AgentRepositoryError::NotFound(agent_id));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReleaseRepository for PostgresStore {
    async fn allocate_next_version(
        &self,
        agent_id: &AgentId,
    ) -> ReleaseRepositoryResult<VersionNumber> {
        let agent = agent_id.clone();
        self.run_blocking(move |connection| {
            let allocated = diesel::update(managed_agents::table.find(agent.as_str()))
                .set(managed_agents::last_version.eq(managed_agents::last_version + 1))
                .returning(managed_agents::last_version)
                .get_result::<i32>(connection)
                .optional()?
                .ok_or_else(|| ReleaseRepositoryError::AgentNotFound(agent.clone()))?;
            VersionNumber::from_storage(i64::from(allocated))
                .map_err(ReleaseRepositoryError::invalid_persisted_data)
        })
        .await
    }

    async fn insert_version(&self, version: &AgentVersion) -> ReleaseRepositoryResult<VersionId> {
        let row = version_to_row(version)?;
        let agent_id = version.agent_id().clone();
        let number = version.version();
        let id = version.id();

        self.run_blocking(move |connection| {
            diesel::insert_into(agent_versions::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        ReleaseRepositoryError::AgentNotFound(agent_id.clone())
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        ReleaseRepositoryError::VersionConflict {
                            agent_id: agent_id.clone(),
                            version: number,
                        }
                    }
                    _ => ReleaseRepositoryError::persistence(err),
                })?;
            Ok(id)
        })
        .await
    }

    async fn update_version(&self, version: &AgentVersion) -> ReleaseRepositoryResult<()> {
        let row = version_to_row(version)?;
        self.run_blocking(move |connection| write_version(connection, &row))
            .await
    }

    async fn find_version(
        &self,
        agent_id: &AgentId,
        version: VersionNumber,
    ) -> ReleaseRepositoryResult<Option<AgentVersion>> {
        let agent = agent_id.as_str().to_owned();
        let number = storage_number(version)?;
        self.run_blocking(move |connection| {
            let row = agent_versions::table
                .filter(agent_versions::agent_id.eq(&agent))
                .filter(agent_versions::version.eq(number))
                .select(VersionRow::as_select())
                .first::<VersionRow>(connection)
                .optional()?;
            row.map(row_to_version).transpose()
        })
        .await
    }

    async fn find_version_by_id(
        &self,
        id: VersionId,
    ) -> ReleaseRepositoryResult<Option<AgentVersion>> {
        self.run_blocking(move |connection| {
            let row = agent_versions::table
                .find(id.into_inner())
                .select(VersionRow::as_select())
                .first::<VersionRow>(connection)
                .optional()?;
            row.map(row_to_version).transpose()
        })
        .await
    }

    async fn list_versions(&self, agent_id: &AgentId) -> ReleaseRepositoryResult<Vec<AgentVersion>> {
        let agent = agent_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = agent_versions::table
                .filter(agent_versions::agent_id.eq(&agent))
                .order(agent_versions::version.desc())
                .select(VersionRow::as_select())
                .load::<VersionRow>(connection)?;
            rows.into_iter().map(row_to_version).collect()
        })
        .await
    }

    async fn find_running_deployment(
        &self,
        agent_id: &AgentId,
    ) -> ReleaseRepositoryResult<Option<Deployment>> {
        let agent = agent_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = deployments::table
                .filter(deployments::agent_id.eq(&agent))
                .filter(deployments::status.eq(DeploymentStatus::Running.as_str()))
                .order(deployments::created_at.desc())
                .select(DeploymentRow::as_select())
                .first::<DeploymentRow>(connection)
                .optional()?;
            row.map(row_to_deployment).transpose()
        })
        .await
    }

    async fn list_deployments(&self, agent_id: &AgentId) -> ReleaseRepositoryResult<Vec<Deployment>> {
        let agent = agent_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = deployments::table
                .filter(deployments::agent_id.eq(&agent))
                .order((deployments::created_at.desc(), deployments::id.desc()))
                .select(DeploymentRow::as_select())
                .load::<DeploymentRow>(connection)?;
            rows.into_iter().map(row_to_deployment).collect()
        })
        .await
    }

    async fn update_deployment(&self, deployment: &Deployment) -> ReleaseRepositoryResult<()> {
        let row = deployment_to_row(deployment);
        self.run_blocking(move |connection| {
            let updated_count = diesel::update(deployments::table.find(row.id))
                .set((
                    deployments::status.eq(&row.status),
                    deployments::updated_at.eq(row.updated_at),
                ))
                .execute(connection)?;
            if updated_count == 0 {
                return Err(ReleaseRepositoryError::DeploymentNotFound(
                    DeploymentId::from_uuid(row.id),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn record_deployment(&self, commit: &DeploymentCommit) -> ReleaseRepositoryResult<()> {
        let deployment = deployment_to_row(&commit.deployment);
        let versions = std::iter::once(&commit.version)
            .chain(commit.superseded.as_ref())
            .map(version_to_row)
            .collect::<ReleaseRepositoryResult<Vec<_>>>()?;

        self.run_blocking(move |connection| {
            connection.transaction::<_, ReleaseRepositoryError, _>(|tx| {
                diesel::update(
                    deployments::table
                        .filter(deployments::agent_id.eq(&deployment.agent_id))
                        .filter(deployments::status.eq(DeploymentStatus::Running.as_str())),
                )
                .set((
                    deployments::status.eq(DeploymentStatus::Stopped.as_str()),
                    deployments::updated_at.eq(deployment.created_at),
                ))
                .execute(tx)?;

                for row in &versions {
                    write_version(tx, row)?;
                }

                diesel::insert_into(deployments::table)
                    .values(&deployment)
                    .execute(tx)?;
                Ok(())
            })
        })
        .await
    }
}

fn write_version(connection: &mut PgConnection, row: &VersionRow) -> ReleaseRepositoryResult<()> {
    let updated_count = diesel::update(agent_versions::table.find(row.id))
        .set((
            agent_versions::artifact_uri.eq(&row.artifact_uri),
            agent_versions::deploy_ref.eq(&row.deploy_ref),
            agent_versions::status.eq(&row.status),
            agent_versions::updated_at.eq(row.updated_at),
        ))
        .execute(connection)?;
    if updated_count == 0 {
        return Err(ReleaseRepositoryError::VersionNotFound(
            VersionId::from_uuid(row.id),
        ));
    }
    Ok(())
}

fn row_to_agent(row: AgentRow) -> AgentRepositoryResult<ManagedAgent> {
    let AgentRow {
        id,
        name,
        description,
        engine_config,
        retrieval_config,
        deployment_config,
        created_at,
        updated_at,
        ..
    } = row;

    let retrieval: RetrievalConfig = serde_json::from_value(retrieval_config)
        .map_err(AgentRepositoryError::invalid_persisted_data)?;
    let deployment: DeploymentConfig = serde_json::from_value(deployment_config)
        .map_err(AgentRepositoryError::invalid_persisted_data)?;

    let data = PersistedAgentData {
        id: AgentId::new(id).map_err(AgentRepositoryError::invalid_persisted_data)?,
        name: AgentName::new(name).map_err(AgentRepositoryError::invalid_persisted_data)?,
        description,
        engine_config: EngineConfig::new(engine_config)
            .map_err(AgentRepositoryError::invalid_persisted_data)?,
        retrieval,
        deployment,
        created_at,
        updated_at,
    };
    Ok(ManagedAgent::from_persisted(data))
}

fn version_to_row(version: &AgentVersion) -> ReleaseRepositoryResult<VersionRow> {
    let artifact_uri = version
        .artifact_uri()
        .ok_or_else(|| ReleaseRepositoryError::IncompleteVersion(version.version()))?;
    Ok(VersionRow {
        id: version.id().into_inner(),
        agent_id: version.agent_id().as_str().to_owned(),
        version: storage_number(version.version())?,
        image_tag: version.image_tag().as_str().to_owned(),
        artifact_uri: artifact_uri.as_str().to_owned(),
        deploy_target: version.deploy_target().as_str().to_owned(),
        deploy_ref: version.deploy_ref().map(|reference| reference.as_str().to_owned()),
        status: version.status().as_str().to_owned(),
        created_at: version.created_at(),
        updated_at: version.updated_at(),
    })
}

fn row_to_version(row: VersionRow) -> ReleaseRepositoryResult<AgentVersion> {
    let data = PersistedVersionData {
        id: VersionId::from_uuid(row.id),
        agent_id: AgentId::new(row.agent_id)
            .map_err(ReleaseRepositoryError::invalid_persisted_data)?,
        version: VersionNumber::from_storage(i64::from(row.version))
            .map_err(ReleaseRepositoryError::invalid_persisted_data)?,
        image_tag: ImageTag::new(row.image_tag),
        artifact_uri: Some(ArtifactUri::new(row.artifact_uri)),
        deploy_target: DeploymentTarget::try_from(row.deploy_target.as_str())
            .map_err(ReleaseRepositoryError::invalid_persisted_data)?,
        deploy_ref: row.deploy_ref.map(DeployRef::new),
        status: VersionStatus::try_from(row.status.as_str())
            .map_err(ReleaseRepositoryError::invalid_persisted_data)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    Ok(AgentVersion::from_persisted(data))
}

fn deployment_to_row(deployment: &Deployment) -> DeploymentRow {
    DeploymentRow {
        id: deployment.id().into_inner(),
        agent_id: deployment.agent_id().as_str().to_owned(),
        version_id: deployment.version_id().into_inner(),
        target: deployment.target().as_str().to_owned(),
        endpoint_url: deployment.endpoint_url().to_owned(),
        router_id: deployment.router_id().map(str::to_owned),
        deploy_ref: deployment.deploy_ref().as_str().to_owned(),
        status: deployment.status().as_str().to_owned(),
        created_at: deployment.created_at(),
        updated_at: deployment.updated_at(),
    }
}

fn row_to_deployment(row: DeploymentRow) -> ReleaseRepositoryResult<Deployment> {
    let data = PersistedDeploymentData {
        id: DeploymentId::from_uuid(row.id),
        agent_id: AgentId::new(row.agent_id)
            .map_err(ReleaseRepositoryError::invalid_persisted_data)?,
        version_id: VersionId::from_uuid(row.version_id),
        target: DeploymentTarget::try_from(row.target.as_str())
            .map_err(ReleaseRepositoryError::invalid_persisted_data)?,
        endpoint_url: row.endpoint_url,
        router_id: row.router_id,
        deploy_ref: DeployRef::new(row.deploy_ref),
        status: DeploymentStatus::try_from(row.status.as_str())
            .map_err(ReleaseRepositoryError::invalid_persisted_data)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    Ok(Deployment::from_persisted(data))
}
