//! Container deployer for the local target.

use crate::agent::domain::{DeploymentConfig, DeploymentTarget};
use crate::release::domain::{DeployOutcome, DeployRef, ImageTag, ServiceName};
use crate::release::ports::{
    CommandError, CommandRunner, DeployCapability, DeployError, DeployResult,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::build::DEFAULT_DOCKER_PROGRAM;

/// Port every agent runtime listens on inside its container.
pub const AGENT_PORT: u16 = 8000;
/// Network used when neither the agent nor the process names one.
pub const DEFAULT_NETWORK: &str = "atelier_network";
/// Base URL of the path-prefix router.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost";

/// Runs agent images as containers behind a path-prefix router.
///
/// Only [`DeploymentTarget::Local`] is implemented; cloud targets report
/// [`DeployError::Unsupported`].
pub struct ContainerDeployer<R: CommandRunner> {
    runner: Arc<R>,
    program: String,
    default_network: String,
    public_base_url: String,
}

impl<R: CommandRunner> ContainerDeployer<R> {
    /// Creates a deployer using `docker` on the default network.
    #[must_use]
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            runner,
            program: DEFAULT_DOCKER_PROGRAM.to_owned(),
            default_network: DEFAULT_NETWORK.to_owned(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_owned(),
        }
    }

    /// Overrides the engine executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the network used when an agent does not name one.
    #[must_use]
    pub fn with_default_network(mut self, network: impl Into<String>) -> Self {
        self.default_network = network.into();
        self
    }

    /// Sets the router's public base URL.
    #[must_use]
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    fn network<'a>(&'a self, config: &'a DeploymentConfig) -> DeployResult<&'a str> {
        match config {
            DeploymentConfig::Local { docker_network } => Ok(docker_network
                .as_deref()
                .filter(|network| !network.trim().is_empty())
                .unwrap_or(self.default_network.as_str())),
            other => Err(DeployError::Unsupported(other.target())),
        }
    }

    async fn remove_container(&self, name: &str) -> DeployResult<()> {
        let args = vec!["rm".to_owned(), "-f".to_owned(), name.to_owned()];
        let output = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(command_error)?;
        if !output.success() {
            return Err(DeployError::Failed(output.diagnostic()));
        }
        Ok(())
    }
}

fn command_error(err: CommandError) -> DeployError {
    match err {
        CommandError::NotFound { .. } => DeployError::Unavailable(err.to_string()),
        other => DeployError::Failed(other.to_string()),
    }
}

fn router_labels(service: &ServiceName) -> [String; 3] {
    [
        "traefik.enable=true".to_owned(),
        format!("traefik.http.routers.{service}.rule=PathPrefix(`/api/v1/agents/{service}`)"),
        format!("traefik.http.services.{service}.loadbalancer.server.port={AGENT_PORT}"),
    ]
}

#[async_trait]
impl<R: CommandRunner> DeployCapability for ContainerDeployer<R> {
    fn ensure_supported(&self, config: &DeploymentConfig) -> DeployResult<()> {
        self.network(config).map(|_| ())
    }

    async fn deploy(
        &self,
        image: &ImageTag,
        service: &ServiceName,
        config: &DeploymentConfig,
    ) -> DeployResult<DeployOutcome> {
        let network = self.network(config)?;

        match self.remove_container(service.as_str()).await {
            Ok(()) => debug!(%service, "removed previous container"),
            Err(err) => warn!(%service, error = %err, "could not remove previous container"),
        }

        let mut args = vec![
            "run".to_owned(),
            "-d".to_owned(),
            "--name".to_owned(),
            service.as_str().to_owned(),
            "--network".to_owned(),
            network.to_owned(),
        ];
        for label in router_labels(service) {
            args.push("--label".to_owned());
            args.push(label);
        }
        args.push(image.as_str().to_owned());

        info!(%service, %image, network, "starting container");
        let output = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(command_error)?;
        if !output.success() {
            return Err(DeployError::Failed(output.diagnostic()));
        }
        let container_id = output.stdout.trim();
        if container_id.is_empty() {
            return Err(DeployError::Failed(
                "container engine returned no container id".to_owned(),
            ));
        }

        Ok(DeployOutcome {
            endpoint_url: format!("{}/api/v1/agents/{service}", self.public_base_url),
            deploy_ref: DeployRef::new(container_id),
            router_id: Some(service.as_str().to_owned()),
        })
    }

    async fn delete(&self, deploy_ref: &DeployRef, config: &DeploymentConfig) -> DeployResult<()> {
        if config.target() != DeploymentTarget::Local {
            return Err(DeployError::Unsupported(config.target()));
        }
        info!(%deploy_ref, "removing container");
        self.remove_container(deploy_ref.as_str()).await
    }
}
