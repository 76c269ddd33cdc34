//! Version numbering under concurrent pipelines.

use super::helpers::{Harness, harness, zip_source};
use atelier::agent::domain::AgentId;
use atelier::release::ports::{ReleaseRepository, ReleaseRepositoryError};
use eyre::Result;
use rstest::rstest;
use std::sync::Arc;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_deploys_get_consecutive_numbers(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let orchestrator = harness.orchestrator.clone();
            let id = agent_id.clone();
            tokio::spawn(async move { orchestrator.deploy(&id).await })
        })
        .collect();
    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await??.version.version().value());
    }
    numbers.sort_unstable();

    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    let stored: Vec<u32> = harness
        .orchestrator
        .list_versions(&agent_id)
        .await?
        .iter()
        .map(|version| version.version().value())
        .collect();
    assert_eq!(stored, vec![5, 4, 3, 2, 1]);
    let running = harness
        .orchestrator
        .list_deployments(&agent_id)
        .await?
        .iter()
        .filter(|deployment| deployment.status().as_str() == "running")
        .count();
    assert_eq!(running, 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn allocation_is_strictly_increasing_across_tasks(harness: Harness) -> Result<()> {
    let agent_id = harness.register("demo", zip_source()?).await?;
    let store = Arc::clone(&harness.store);

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let repo = Arc::clone(&store);
            let id = agent_id.clone();
            tokio::spawn(async move { repo.allocate_next_version(&id).await })
        })
        .collect();
    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await??.value());
    }
    numbers.sort_unstable();
    numbers.dedup();

    assert_eq!(numbers, (1..=32).collect::<Vec<u32>>());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn allocation_for_unknown_agent_fails(harness: Harness) -> Result<()> {
    let ghost = AgentId::new("ghost")?;

    let result = harness.store.allocate_next_version(&ghost).await;

    assert!(matches!(result, Err(ReleaseRepositoryError::AgentNotFound(_))));
    Ok(())
}
