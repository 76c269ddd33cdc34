//! Deploy, rollback, and decommission through the in-memory stack.

use super::helpers::{Harness, harness, zip_source};
use atelier::agent::{
    domain::{DeploymentConfig, RetrievalConfig},
    services::{AgentRegistryServiceError, UpdateAgentRequest},
    ports::AgentRepositoryError,
};
use atelier::release::{
    domain::{AgentVersion, DeploymentStatus, PipelineStage, ServiceName, VersionNumber, VersionStatus},
    ports::ReleaseRepository,
    services::ReleaseServiceError,
};
use eyre::{Result, eyre};
use rstest::rstest;

fn number(value: u32) -> Result<VersionNumber> {
    Ok(VersionNumber::new(value)?)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sequential_deploys_replace_the_same_service(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;

    let first = harness.orchestrator.deploy(&agent_id).await?;
    let second = harness.orchestrator.deploy(&agent_id).await?;

    assert_eq!(first.version.version(), number(1)?);
    assert_eq!(second.version.version(), number(2)?);
    let service = ServiceName::for_agent(&agent_id);
    let starts = harness.host.starts()?;
    assert_eq!(starts.len(), 2);
    assert!(starts.iter().all(|(name, _)| *name == service));
    assert_eq!(
        harness.host.running_image(&service)?.as_ref(),
        Some(second.version.image_tag())
    );

    let deployments = harness.orchestrator.list_deployments(&agent_id).await?;
    let statuses: Vec<_> = deployments.iter().map(|d| d.status()).collect();
    assert_eq!(
        statuses,
        vec![DeploymentStatus::Running, DeploymentStatus::Stopped]
    );
    assert_eq!(
        second.deployment.endpoint_url(),
        "http://localhost/api/v1/agents/agent-demo"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rollback_redeploys_the_stored_image(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    let first = harness.orchestrator.deploy(&agent_id).await?;
    harness.orchestrator.deploy(&agent_id).await?;

    let rolled = harness.orchestrator.rollback(&agent_id, number(1)?).await?;

    assert_eq!(rolled.version.id(), first.version.id());
    assert_eq!(rolled.version.image_tag(), first.version.image_tag());
    assert_eq!(rolled.version.artifact_uri(), first.version.artifact_uri());
    assert_eq!(rolled.version.status(), VersionStatus::Deployed);
    assert_eq!(harness.builder.built()?.len(), 2);

    let versions = harness.orchestrator.list_versions(&agent_id).await?;
    let summary: Vec<_> = versions
        .iter()
        .map(|v| (v.version().value(), v.status()))
        .collect();
    assert_eq!(
        summary,
        vec![(2, VersionStatus::RolledBack), (1, VersionStatus::Deployed)]
    );

    let running = harness
        .store
        .find_running_deployment(&agent_id)
        .await?
        .ok_or_else(|| eyre!("a deployment should be running"))?;
    assert_eq!(running.version_id(), first.version.id());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rollback_never_allocates_a_number(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    harness.orchestrator.deploy(&agent_id).await?;
    harness.orchestrator.deploy(&agent_id).await?;
    harness.orchestrator.rollback(&agent_id, number(1)?).await?;

    let next = harness.orchestrator.deploy(&agent_id).await?;

    assert_eq!(next.version.version(), number(3)?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rollback_to_unknown_version_is_not_found(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    harness.orchestrator.deploy(&agent_id).await?;

    let err = harness
        .orchestrator
        .rollback(&agent_id, number(7)?)
        .await
        .err()
        .ok_or_else(|| eyre!("rollback to v7 should fail"))?;

    assert!(matches!(err, ReleaseServiceError::VersionNotFound { .. }));
    assert_eq!(err.stage(), Some(PipelineStage::Preflight));
    assert_eq!(harness.host.starts()?.len(), 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_archive_payload_records_no_version(harness: Harness) -> Result<()> {
    let agent_id = harness
        .register("demo", RetrievalConfig::Archive { archive_b64: None })
        .await?;

    let err = harness
        .orchestrator
        .deploy(&agent_id)
        .await
        .err()
        .ok_or_else(|| eyre!("deploy without source should fail"))?;

    assert_eq!(err.stage(), Some(PipelineStage::Retrieve));
    assert!(harness.orchestrator.list_versions(&agent_id).await?.is_empty());
    assert!(harness.builder.built()?.is_empty());

    let patch = UpdateAgentRequest {
        retrieval: Some(zip_source()?),
        ..UpdateAgentRequest::default()
    };
    harness.registry.update(&agent_id, patch).await?;
    let report = harness.orchestrator.deploy(&agent_id).await?;
    assert_eq!(report.version.version(), number(2)?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unsupported_target_consumes_no_number(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    let to_cloud = UpdateAgentRequest {
        deployment: Some(DeploymentConfig::K8s { namespace: None }),
        ..UpdateAgentRequest::default()
    };
    harness.registry.update(&agent_id, to_cloud).await?;

    let err = harness
        .orchestrator
        .deploy(&agent_id)
        .await
        .err()
        .ok_or_else(|| eyre!("k8s deploy should be unsupported"))?;
    assert_eq!(err.stage(), Some(PipelineStage::Preflight));

    let to_local = UpdateAgentRequest {
        deployment: Some(DeploymentConfig::local()),
        ..UpdateAgentRequest::default()
    };
    harness.registry.update(&agent_id, to_local).await?;
    let report = harness.orchestrator.deploy(&agent_id).await?;
    assert_eq!(report.version.version(), number(1)?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn build_failure_discards_nothing_persisted(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    harness.builder.set_failure(Some("base image missing"))?;

    let err = harness
        .orchestrator
        .deploy(&agent_id)
        .await
        .err()
        .ok_or_else(|| eyre!("build should fail"))?;

    assert_eq!(err.stage(), Some(PipelineStage::Build));
    assert!(harness.orchestrator.list_versions(&agent_id).await?.is_empty());
    assert!(harness.host.starts()?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_deploy_stops_the_replaced_deployment(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    let first = harness.orchestrator.deploy(&agent_id).await?;
    harness.host.set_failure(Some("port in use"))?;

    let err = harness
        .orchestrator
        .deploy(&agent_id)
        .await
        .err()
        .ok_or_else(|| eyre!("second deploy should fail"))?;

    assert_eq!(err.stage(), Some(PipelineStage::Deploy));
    let versions = harness.orchestrator.list_versions(&agent_id).await?;
    let statuses: Vec<_> = versions.iter().map(AgentVersion::status).collect();
    assert_eq!(statuses, vec![VersionStatus::Failed, VersionStatus::Deployed]);
    assert!(harness.store.find_running_deployment(&agent_id).await?.is_none());
    let deployments = harness.orchestrator.list_deployments(&agent_id).await?;
    assert_eq!(deployments.len(), 1);
    assert!(deployments.iter().all(|d| d.id() == first.deployment.id()));
    assert!(deployments.iter().all(|d| d.status() == DeploymentStatus::Stopped));
    assert_eq!(harness.host.removed()?, vec![first.deployment.deploy_ref().clone()]);
    assert!(
        harness
            .host
            .running_image(&ServiceName::for_agent(&agent_id))?
            .is_none()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_rollback_leaves_version_statuses_alone(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    harness.orchestrator.deploy(&agent_id).await?;
    harness.orchestrator.deploy(&agent_id).await?;
    harness.host.set_failure(Some("port in use"))?;

    let err = harness
        .orchestrator
        .rollback(&agent_id, number(1)?)
        .await
        .err()
        .ok_or_else(|| eyre!("rollback should fail"))?;

    assert_eq!(err.stage(), Some(PipelineStage::Deploy));
    let versions = harness.orchestrator.list_versions(&agent_id).await?;
    let summary: Vec<_> = versions
        .iter()
        .map(|v| (v.version().value(), v.status()))
        .collect();
    assert_eq!(
        summary,
        vec![(2, VersionStatus::Deployed), (1, VersionStatus::Deployed)]
    );
    assert!(harness.store.find_running_deployment(&agent_id).await?.is_none());
    let deployments = harness.orchestrator.list_deployments(&agent_id).await?;
    assert!(deployments.iter().all(|d| d.status() == DeploymentStatus::Stopped));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rollback_to_the_running_version_redeploys_it(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    let first = harness.orchestrator.deploy(&agent_id).await?;

    let again = harness.orchestrator.rollback(&agent_id, number(1)?).await?;

    assert_eq!(again.version.id(), first.version.id());
    let versions = harness.orchestrator.list_versions(&agent_id).await?;
    let statuses: Vec<_> = versions.iter().map(AgentVersion::status).collect();
    assert_eq!(statuses, vec![VersionStatus::Deployed]);

    let deployments = harness.orchestrator.list_deployments(&agent_id).await?;
    let summary: Vec<_> = deployments.iter().map(|d| (d.id(), d.status())).collect();
    assert_eq!(
        summary,
        vec![
            (again.deployment.id(), DeploymentStatus::Running),
            (first.deployment.id(), DeploymentStatus::Stopped),
        ]
    );
    let running = harness
        .store
        .find_running_deployment(&agent_id)
        .await?
        .ok_or_else(|| eyre!("the redeployed version should run"))?;
    assert_eq!(running.id(), again.deployment.id());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agents_with_the_same_slug_keep_their_own_images(harness: Harness) -> Result<()> {
    let alpha = harness.register_as("alpha", "Demo Agent", zip_source()?).await?;
    let beta = harness.register_as("beta", "demo-agent", zip_source()?).await?;

    let alpha_first = harness.orchestrator.deploy(&alpha).await?;
    let beta_first = harness.orchestrator.deploy(&beta).await?;
    assert_ne!(alpha_first.version.image_tag(), beta_first.version.image_tag());
    harness.orchestrator.deploy(&alpha).await?;

    harness.builder.set_failure(Some("layer too large"))?;
    harness
        .orchestrator
        .deploy(&beta)
        .await
        .err()
        .ok_or_else(|| eyre!("beta build should fail"))?;
    harness.builder.set_failure(None)?;

    let discarded = harness.builder.discarded()?;
    assert_eq!(discarded.len(), 1);
    assert!(discarded.iter().all(|tag| tag.as_str().contains(":beta-v")));
    assert!(harness.builder.contains(alpha_first.version.image_tag())?);

    let rolled = harness.orchestrator.rollback(&alpha, number(1)?).await?;
    assert_eq!(
        harness
            .host
            .running_image(&ServiceName::for_agent(&alpha))?
            .as_ref(),
        Some(alpha_first.version.image_tag())
    );
    assert_eq!(rolled.version.image_tag(), alpha_first.version.image_tag());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn decommission_stops_instance_and_deletes_history(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    let report = harness.orchestrator.deploy(&agent_id).await?;

    harness.orchestrator.decommission(&agent_id).await?;

    assert_eq!(harness.host.removed()?, vec![report.deployment.deploy_ref().clone()]);
    assert!(
        harness
            .host
            .running_image(&ServiceName::for_agent(&agent_id))?
            .is_none()
    );
    assert!(matches!(
        harness.registry.get(&agent_id).await,
        Err(AgentRegistryServiceError::Repository(
            AgentRepositoryError::NotFound(_)
        ))
    ));
    assert!(harness.store.list_versions(&agent_id).await?.is_empty());
    assert!(harness.store.list_deployments(&agent_id).await?.is_empty());
    Ok(())
}
