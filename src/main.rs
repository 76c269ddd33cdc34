//! `atelier` command line.
//!
//! Every subcommand mirrors one operation of the management surface:
//!
//! ```text
//! atelier agent create --file agent.json
//! atelier agent list
//! atelier deploy <agent-id>
//! atelier rollback <agent-id> <version>
//! atelier versions <agent-id>
//! atelier deployments <agent-id>
//! ```
//!
//! Settings come from `ATELIER_*` environment variables; see
//! [`atelier::config::AtelierConfig`].

use atelier::agent::domain::AgentId;
use atelier::agent::services::{AgentRegistryService, CreateAgentRequest, UpdateAgentRequest};
use atelier::config::AtelierConfig;
use atelier::release::adapters::TokioCommandRunner;
use atelier::release::domain::VersionNumber;
use atelier::release::services::{ReleaseOrchestrator, ReleaseServiceError};
use atelier::store::{PostgresStore, postgres};
use atelier::telemetry::{self, LogFormat};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tracing::warn;

/// Versioned build, deploy, and rollback for managed agents.
#[derive(Debug, Parser)]
#[command(name = "atelier", version, about, long_about = None)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, env = "ATELIER_LOG_FORMAT", value_enum, default_value_t)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage agent registrations.
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
    /// Build, publish, and deploy a new version.
    Deploy {
        /// Agent identifier.
        agent_id: String,
    },
    /// Redeploy an existing version without rebuilding.
    Rollback {
        /// Agent identifier.
        agent_id: String,
        /// Version number to redeploy.
        version: u32,
    },
    /// List an agent's versions, newest first.
    Versions {
        /// Agent identifier.
        agent_id: String,
    },
    /// List an agent's deployments, newest first.
    Deployments {
        /// Agent identifier.
        agent_id: String,
    },
}

#[derive(Debug, Subcommand)]
enum AgentCommand {
    /// Register an agent from a JSON document.
    Create {
        /// Path to the request document.
        #[arg(long)]
        file: Utf8PathBuf,
    },
    /// List agents, oldest first.
    List,
    /// Show one agent.
    Get {
        /// Agent identifier.
        agent_id: String,
    },
    /// Apply a partial update from a JSON document.
    Update {
        /// Agent identifier.
        agent_id: String,
        /// Path to the patch document.
        #[arg(long)]
        file: Utf8PathBuf,
    },
    /// Stop the running instance and delete the agent with its history.
    Delete {
        /// Agent identifier.
        agent_id: String,
    },
}

type Registry = AgentRegistryService<PostgresStore, DefaultClock>;
type Orchestrator = ReleaseOrchestrator<PostgresStore, PostgresStore, DefaultClock>;

struct App {
    registry: Registry,
    orchestrator: Orchestrator,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format).map_err(|err| eyre!(err))?;

    let config = AtelierConfig::from_env().wrap_err("invalid ATELIER_* configuration")?;
    let app = App::connect(&config).await?;
    app.run(cli.command).await
}

impl App {
    async fn connect(config: &AtelierConfig) -> Result<Self> {
        let url = config
            .database_url
            .clone()
            .ok_or_else(|| eyre!("ATELIER_DATABASE_URL must be set"))?;
        let pool_size = config.pool_size;
        let pool = tokio::task::spawn_blocking(move || postgres::connect(&url, pool_size))
            .await?
            .wrap_err("failed to connect to the database")?;

        let store = Arc::new(PostgresStore::new(pool));
        let clock = Arc::new(DefaultClock);
        let runner = Arc::new(TokioCommandRunner::new(config.command_timeout()));
        Ok(Self {
            registry: AgentRegistryService::new(Arc::clone(&store), Arc::clone(&clock)),
            orchestrator: ReleaseOrchestrator::new(
                Arc::clone(&store),
                store,
                clock,
                config.toolchain(runner),
                config.pipeline_settings(),
            ),
        })
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Agent { command } => self.run_agent(command).await,
            Command::Deploy { agent_id } => {
                let report = self
                    .orchestrator
                    .deploy(&parse_agent_id(agent_id)?)
                    .await
                    .map_err(release_report)?;
                emit(&json!({
                    "version": report.version,
                    "deployment": report.deployment,
                }))
            }
            Command::Rollback { agent_id, version } => {
                let number = VersionNumber::new(version)?;
                let report = self
                    .orchestrator
                    .rollback(&parse_agent_id(agent_id)?, number)
                    .await
                    .map_err(release_report)?;
                emit(&json!({
                    "version": report.version,
                    "deployment": report.deployment,
                }))
            }
            Command::Versions { agent_id } => emit(
                &self
                    .orchestrator
                    .list_versions(&parse_agent_id(agent_id)?)
                    .await
                    .map_err(release_report)?,
            ),
            Command::Deployments { agent_id } => emit(
                &self
                    .orchestrator
                    .list_deployments(&parse_agent_id(agent_id)?)
                    .await
                    .map_err(release_report)?,
            ),
        }
    }

    async fn run_agent(&self, command: AgentCommand) -> Result<()> {
        match command {
            AgentCommand::Create { file } => {
                let request: CreateAgentRequest = read_document(&file).await?;
                emit(&self.registry.create(request).await?)
            }
            AgentCommand::List => emit(&self.registry.list().await?),
            AgentCommand::Get { agent_id } => {
                emit(&self.registry.get(&parse_agent_id(agent_id)?).await?)
            }
            AgentCommand::Update { agent_id, file } => {
                let request: UpdateAgentRequest = read_document(&file).await?;
                emit(
                    &self
                        .registry
                        .update(&parse_agent_id(agent_id)?, request)
                        .await?,
                )
            }
            AgentCommand::Delete { agent_id } => {
                let id = parse_agent_id(agent_id)?;
                self.orchestrator
                    .decommission(&id)
                    .await
                    .map_err(release_report)?;
                emit(&json!({ "deleted": id }))
            }
        }
    }
}

fn parse_agent_id(value: String) -> Result<AgentId> {
    Ok(AgentId::new(value)?)
}

fn release_report(err: ReleaseServiceError) -> eyre::Report {
    if err.is_retryable() {
        warn!(error = %err, "release can be retried");
    }
    match err.stage() {
        Some(stage) => eyre::Report::new(err).wrap_err(format!("release failed at {stage}")),
        None => eyre::Report::new(err),
    }
}

async fn read_document<T: DeserializeOwned>(path: &Utf8Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("failed to read {path}"))?;
    serde_json::from_str(&raw).wrap_err_with(|| format!("{path} is not a valid request"))
}

fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
