//! Store behaviour against a real `PostgreSQL` database.

use crate::postgres::helpers::{agent, prepare_store};
use atelier::agent::{
    domain::{AgentId, AgentName, DeploymentTarget},
    ports::{AgentRepository, AgentRepositoryError},
};
use atelier::release::{
    domain::{
        AgentVersion, ArtifactUri, DeployOutcome, DeployRef, Deployment, DeploymentStatus,
        ImageTag, VersionNumber, VersionStatus, DEFAULT_IMAGE_PREFIX,
    },
    ports::{DeploymentCommit, ReleaseRepository, ReleaseRepositoryError},
};
use atelier::store::PostgresStore;
use eyre::{Result, eyre};
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::Arc;

async fn built_version(
    store: &PostgresStore,
    agent_id: &AgentId,
    name: &AgentName,
) -> Result<AgentVersion> {
    let number = store.allocate_next_version(agent_id).await?;
    let tag = ImageTag::for_version(DEFAULT_IMAGE_PREFIX, agent_id, name, number)?;
    let mut version = AgentVersion::new(
        agent_id.clone(),
        number,
        tag.clone(),
        DeploymentTarget::Local,
        &DefaultClock,
    );
    version.mark_built(ArtifactUri::new(format!("local://{tag}")), &DefaultClock)?;
    store.insert_version(&version).await?;
    Ok(version)
}

fn deployment_commit(version: &AgentVersion, reference: &str) -> Result<DeploymentCommit> {
    let mut deployed = version.clone();
    deployed.mark_deployed(DeployRef::new(reference), &DefaultClock)?;
    let deployment = Deployment::new(
        &deployed,
        DeploymentTarget::Local,
        DeployOutcome {
            endpoint_url: "http://localhost/api/v1/agents/agent-demo".to_owned(),
            deploy_ref: DeployRef::new(reference),
            router_id: Some("agent-demo".to_owned()),
        },
        &DefaultClock,
    );
    Ok(DeploymentCommit {
        deployment,
        version: deployed,
        superseded: None,
    })
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agent_round_trips_through_jsonb_columns() -> Result<()> {
    let Some(prepared) = prepare_store()? else {
        return Ok(());
    };
    let demo = agent("demo", "Demo Agent")?;

    prepared.store.create(&demo).await?;
    let found = prepared
        .store
        .find_by_id(demo.id())
        .await?
        .ok_or_else(|| eyre!("agent should exist"))?;

    assert_eq!(found.name(), demo.name());
    assert_eq!(found.engine_config(), demo.engine_config());
    assert_eq!(found.retrieval(), demo.retrieval());
    assert_eq!(found.deployment(), demo.deployment());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_name_maps_to_typed_error() -> Result<()> {
    let Some(prepared) = prepare_store()? else {
        return Ok(());
    };
    prepared.store.create(&agent("first", "shared")?).await?;

    let result = prepared.store.create(&agent("second", "shared")?).await;

    assert!(matches!(
        result,
        Err(AgentRepositoryError::DuplicateAgentName(_))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_allocation_never_repeats_a_number() -> Result<()> {
    let Some(prepared) = prepare_store()? else {
        return Ok(());
    };
    let demo = agent("demo", "demo")?;
    prepared.store.create(&demo).await?;
    let store = Arc::new(prepared.store.clone());

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let repo = Arc::clone(&store);
            let id = demo.id().clone();
            tokio::spawn(async move { repo.allocate_next_version(&id).await })
        })
        .collect();
    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await??.value());
    }
    numbers.sort_unstable();

    assert_eq!(numbers, (1..=12).collect::<Vec<u32>>());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_version_number_is_a_conflict() -> Result<()> {
    let Some(prepared) = prepare_store()? else {
        return Ok(());
    };
    let demo = agent("demo", "demo")?;
    prepared.store.create(&demo).await?;
    let first = built_version(&prepared.store, demo.id(), demo.name()).await?;

    let mut clash = AgentVersion::new(
        demo.id().clone(),
        first.version(),
        first.image_tag().clone(),
        DeploymentTarget::Local,
        &DefaultClock,
    );
    clash.mark_built(ArtifactUri::new("local://clash"), &DefaultClock)?;
    let result = prepared.store.insert_version(&clash).await;

    assert!(matches!(
        result,
        Err(ReleaseRepositoryError::VersionConflict { .. })
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn new_deployment_stops_the_previous_one() -> Result<()> {
    let Some(prepared) = prepare_store()? else {
        return Ok(());
    };
    let demo = agent("demo", "demo")?;
    prepared.store.create(&demo).await?;
    let v1 = built_version(&prepared.store, demo.id(), demo.name()).await?;
    let v2 = built_version(&prepared.store, demo.id(), demo.name()).await?;

    prepared
        .store
        .record_deployment(&deployment_commit(&v1, "c1")?)
        .await?;
    let second = deployment_commit(&v2, "c2")?;
    prepared.store.record_deployment(&second).await?;

    let deployments = prepared.store.list_deployments(demo.id()).await?;
    let statuses: Vec<_> = deployments.iter().map(Deployment::status).collect();
    assert_eq!(
        statuses,
        vec![DeploymentStatus::Running, DeploymentStatus::Stopped]
    );
    let running = prepared
        .store
        .find_running_deployment(demo.id())
        .await?
        .ok_or_else(|| eyre!("one deployment should run"))?;
    assert_eq!(running.id(), second.deployment.id());
    let stored = prepared
        .store
        .find_version(demo.id(), VersionNumber::new(2)?)
        .await?
        .ok_or_else(|| eyre!("v2 should exist"))?;
    assert_eq!(stored.status(), VersionStatus::Deployed);
    assert_eq!(stored.deploy_ref(), Some(&DeployRef::new("c2")));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn commit_for_unknown_version_writes_nothing() -> Result<()> {
    let Some(prepared) = prepare_store()? else {
        return Ok(());
    };
    let demo = agent("demo", "demo")?;
    prepared.store.create(&demo).await?;
    let v1 = built_version(&prepared.store, demo.id(), demo.name()).await?;
    prepared
        .store
        .record_deployment(&deployment_commit(&v1, "c1")?)
        .await?;

    let number = prepared.store.allocate_next_version(demo.id()).await?;
    let mut ghost = AgentVersion::new(
        demo.id().clone(),
        number,
        v1.image_tag().clone(),
        DeploymentTarget::Local,
        &DefaultClock,
    );
    ghost.mark_built(ArtifactUri::new("local://ghost"), &DefaultClock)?;
    let result = prepared
        .store
        .record_deployment(&deployment_commit(&ghost, "c2")?)
        .await;

    assert!(matches!(
        result,
        Err(ReleaseRepositoryError::VersionNotFound(_))
    ));
    let deployments = prepared.store.list_deployments(demo.id()).await?;
    assert_eq!(deployments.len(), 1);
    assert!(
        deployments
            .iter()
            .all(|deployment| deployment.status() == DeploymentStatus::Running)
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_an_agent_cascades() -> Result<()> {
    let Some(prepared) = prepare_store()? else {
        return Ok(());
    };
    let demo = agent("demo", "demo")?;
    prepared.store.create(&demo).await?;
    let v1 = built_version(&prepared.store, demo.id(), demo.name()).await?;
    prepared
        .store
        .record_deployment(&deployment_commit(&v1, "c1")?)
        .await?;

    prepared.store.delete(demo.id()).await?;

    assert!(prepared.store.list_versions(demo.id()).await?.is_empty());
    assert!(prepared.store.list_deployments(demo.id()).await?.is_empty());
    assert!(matches!(
        prepared.store.allocate_next_version(demo.id()).await,
        Err(ReleaseRepositoryError::AgentNotFound(_))
    ));
    Ok(())
}
