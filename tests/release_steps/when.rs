//! When steps for release BDD scenarios.

use super::world::{ReleaseWorld, run_async};
use atelier::release::domain::VersionNumber;
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when("the agent is deployed")]
fn agent_is_deployed(world: &mut ReleaseWorld) -> Result<(), eyre::Report> {
    let agent_id = world.agent()?;
    let report = run_async(world.orchestrator.deploy(&agent_id)).wrap_err("deploy agent")?;
    world.last_release = Some(Ok(report));
    Ok(())
}

#[when("a deploy is attempted")]
fn deploy_is_attempted(world: &mut ReleaseWorld) -> Result<(), eyre::Report> {
    let agent_id = world.agent()?;
    world.last_release = Some(run_async(world.orchestrator.deploy(&agent_id)));
    Ok(())
}

#[when("the agent is rolled back to version {version:u32}")]
fn agent_is_rolled_back(world: &mut ReleaseWorld, version: u32) -> Result<(), eyre::Report> {
    let agent_id = world.agent()?;
    let number = VersionNumber::new(version)?;
    let report = run_async(world.orchestrator.rollback(&agent_id, number))
        .wrap_err_with(|| format!("roll back to version {version}"))?;
    world.last_release = Some(Ok(report));
    Ok(())
}
