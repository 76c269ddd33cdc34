//! Agent registration against the in-memory store.

use super::helpers::{Harness, harness, zip_source};
use atelier::agent::{
    domain::{AgentDomainError, RetrievalConfig},
    ports::AgentRepositoryError,
    services::{AgentRegistryServiceError, CreateAgentRequest, UpdateAgentRequest},
};
use atelier::release::ports::ReleaseRepository;
use eyre::Result;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agents_are_listed_oldest_first(harness: Harness) -> Result<()> {
    harness.register("alpha", zip_source()?).await?;
    harness.register("beta", zip_source()?).await?;

    let names: Vec<String> = harness
        .registry
        .list()
        .await?
        .iter()
        .map(|agent| agent.name().as_str().to_owned())
        .collect();

    assert_eq!(names, vec!["alpha".to_owned(), "beta".to_owned()]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_name_is_rejected(harness: Harness) -> Result<()> {
    harness.register("demo", zip_source()?).await?;

    let result = harness
        .registry
        .create(CreateAgentRequest::new("demo", zip_source()?).with_id("other"))
        .await;

    assert!(matches!(
        result,
        Err(AgentRegistryServiceError::Repository(
            AgentRepositoryError::DuplicateAgentName(_)
        ))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repository_source_without_repo_is_rejected(harness: Harness) {
    let result = harness
        .registry
        .create(CreateAgentRequest::new(
            "demo",
            RetrievalConfig::repository("  "),
        ))
        .await;

    assert!(matches!(
        result,
        Err(AgentRegistryServiceError::Domain(
            AgentDomainError::InvalidRetrievalConfig(_)
        ))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn partial_update_keeps_untouched_fields(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    let before = harness.registry.get(&agent_id).await?;

    let patch = UpdateAgentRequest {
        engine_config: Some(json!({ "agent": { "type": "langgraph" } })),
        ..UpdateAgentRequest::default()
    };
    let after = harness.registry.update(&agent_id, patch).await?;

    assert_eq!(after.name(), before.name());
    assert_eq!(after.retrieval(), before.retrieval());
    assert_eq!(
        after.engine_config().as_value(),
        &json!({ "agent": { "type": "langgraph" } })
    );
    assert_eq!(harness.registry.get(&agent_id).await?, after);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn renaming_onto_an_existing_name_fails(harness: Harness) -> Result<()> {
    harness.register("alpha", zip_source()?).await?;
    let beta = harness.register("beta", zip_source()?).await?;

    let patch = UpdateAgentRequest {
        name: Some("alpha".to_owned()),
        ..UpdateAgentRequest::default()
    };
    let result = harness.registry.update(&beta, patch).await;

    assert!(matches!(
        result,
        Err(AgentRegistryServiceError::Repository(
            AgentRepositoryError::DuplicateAgentName(_)
        ))
    ));
    let unchanged = harness.registry.get(&beta).await?;
    assert_eq!(unchanged.name().as_str(), "beta");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_an_agent_cascades_to_release_history(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    harness.orchestrator.deploy(&agent_id).await?;
    harness.orchestrator.deploy(&agent_id).await?;

    harness.registry.delete(&agent_id).await?;

    assert!(harness.store.list_versions(&agent_id).await?.is_empty());
    assert!(harness.store.list_deployments(&agent_id).await?.is_empty());
    assert!(harness.store.find_running_deployment(&agent_id).await?.is_none());
    let reused = harness.register("demo", zip_source()?).await?;
    let report = harness.orchestrator.deploy(&reused).await?;
    assert_eq!(report.version.version().value(), 1);
    Ok(())
}
