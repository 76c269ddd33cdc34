//! Then steps for release BDD scenarios.

use super::world::{ReleaseWorld, run_async};
use atelier::release::domain::VersionStatus;
use eyre::eyre;
use rstest_bdd_macros::then;

#[then(r#"version {version:u32} is "{status}""#)]
fn version_has_status(
    world: &mut ReleaseWorld,
    version: u32,
    status: String,
) -> Result<(), eyre::Report> {
    let expected = VersionStatus::try_from(status.as_str())?;
    let agent_id = world.agent()?;
    let versions = run_async(world.orchestrator.list_versions(&agent_id))?;
    let found = versions
        .iter()
        .find(|candidate| candidate.version().value() == version)
        .ok_or_else(|| eyre!("version {version} was not recorded"))?;
    if found.status() != expected {
        return Err(eyre!(
            "expected version {version} to be {expected}, found {}",
            found.status()
        ));
    }
    Ok(())
}

#[then("the running deployment points at version {version:u32}")]
fn running_deployment_points_at(
    world: &mut ReleaseWorld,
    version: u32,
) -> Result<(), eyre::Report> {
    let agent_id = world.agent()?;
    let deployments = run_async(world.orchestrator.list_deployments(&agent_id))?;
    let versions = run_async(world.orchestrator.list_versions(&agent_id))?;
    let running = deployments
        .iter()
        .find(|deployment| deployment.status().as_str() == "running")
        .ok_or_else(|| eyre!("no running deployment"))?;
    let backing = versions
        .iter()
        .find(|candidate| candidate.id() == running.version_id())
        .ok_or_else(|| eyre!("running deployment references an unknown version"))?;
    if backing.version().value() != version {
        return Err(eyre!(
            "expected running version {version}, found {}",
            backing.version()
        ));
    }
    Ok(())
}

#[then("the agent has {count:usize} versions")]
fn agent_has_versions(world: &mut ReleaseWorld, count: usize) -> Result<(), eyre::Report> {
    let agent_id = world.agent()?;
    let versions = run_async(world.orchestrator.list_versions(&agent_id))?;
    if versions.len() != count {
        return Err(eyre!("expected {count} versions, found {}", versions.len()));
    }
    Ok(())
}

#[then("the agent has {count:usize} deployments")]
fn agent_has_deployments(world: &mut ReleaseWorld, count: usize) -> Result<(), eyre::Report> {
    let agent_id = world.agent()?;
    let deployments = run_async(world.orchestrator.list_deployments(&agent_id))?;
    if deployments.len() != count {
        return Err(eyre!(
            "expected {count} deployments, found {}",
            deployments.len()
        ));
    }
    Ok(())
}

#[then(r#"the last release failed at the "{stage}" stage"#)]
fn last_release_failed_at(world: &ReleaseWorld, stage: String) -> Result<(), eyre::Report> {
    let result = world
        .last_release
        .as_ref()
        .ok_or_else(|| eyre!("no release attempted in scenario world"))?;
    let Err(err) = result else {
        return Err(eyre!("expected the last release to fail"));
    };
    let actual = err.stage().map(|tag| tag.as_str());
    if actual != Some(stage.as_str()) {
        return Err(eyre!("expected failure at {stage}, got {actual:?}: {err}"));
    }
    Ok(())
}
