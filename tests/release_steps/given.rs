//! Given steps for release BDD scenarios.

use super::world::{ReleaseWorld, run_async};
use atelier::agent::{domain::RetrievalConfig, services::CreateAgentRequest};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use eyre::WrapErr;
use rstest_bdd_macros::given;
use std::io::{Cursor, Write};

fn zipped_project() -> eyre::Result<String> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file("main.py", zip::write::SimpleFileOptions::default())?;
    writer.write_all(b"print('ready')\n")?;
    Ok(STANDARD.encode(writer.finish()?.into_inner()))
}

fn register(world: &mut ReleaseWorld, name: &str, retrieval: RetrievalConfig) -> eyre::Result<()> {
    let request = CreateAgentRequest::new(name, retrieval).with_id(name);
    let agent = run_async(world.registry.create(request)).wrap_err("register scenario agent")?;
    world.agent_id = Some(agent.id().clone());
    Ok(())
}

#[given(r#"an agent "{name}" with a zipped source"#)]
fn agent_with_zipped_source(world: &mut ReleaseWorld, name: String) -> Result<(), eyre::Report> {
    let payload = zipped_project()?;
    register(world, &name, RetrievalConfig::archive(payload))
}

#[given(r#"an agent "{name}" with no source payload"#)]
fn agent_without_payload(world: &mut ReleaseWorld, name: String) -> Result<(), eyre::Report> {
    register(world, &name, RetrievalConfig::Archive { archive_b64: None })
}
